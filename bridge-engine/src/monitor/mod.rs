//! Monitor Loops
//!
//! Two background tasks per bridge: the source monitor (lock ingestion,
//! confirmation tracking, local signing, recovery sweep) and the completion
//! sweeper (releases on the target chain). Both poll the store, which is the
//! authoritative record of what still needs doing.
//!
//! A cycle always runs to completion; every chain call inside it is bounded by
//! the client's timeout and retry budget. Cancellation is observed between
//! cycles, so stopping never waits longer than one in-flight cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{MonitorReport, NetworkAdapter};

// ============================================================================
// CYCLES
// ============================================================================

fn log_report(bridge_id: &str, pass: &str, result: Result<MonitorReport, crate::error::BridgeError>) {
    match result {
        Ok(report) if report.is_idle() => debug!("Bridge {}: {} idle", bridge_id, pass),
        Ok(report) => info!("Bridge {}: {} {:?}", bridge_id, pass, report),
        Err(e) => warn!("Bridge {}: {} failed, retrying next cycle: {}", bridge_id, pass, e),
    }
}

/// One source monitor cycle followed by the recovery sweep.
pub async fn run_source_cycle(adapter: &dyn NetworkAdapter) {
    log_report(
        adapter.bridge_id(),
        "source monitor",
        adapter.monitor_source_chain().await,
    );
    log_report(
        adapter.bridge_id(),
        "recovery sweep",
        adapter.sync_pending_transactions().await,
    );
}

/// One completion sweeper cycle.
pub async fn run_completion_cycle(adapter: &dyn NetworkAdapter) {
    log_report(
        adapter.bridge_id(),
        "completion sweeper",
        adapter.monitor_target_chain().await,
    );
}

// ============================================================================
// TASKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Source,
    Completion,
}

/// Spawns a loop that runs one cycle per `interval` until `cancel` fires.
pub fn spawn_loop(
    kind: LoopKind,
    adapter: Arc<dyn NetworkAdapter>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Bridge {}: {:?} loop started", adapter.bridge_id(), kind);
        while !cancel.is_cancelled() {
            match kind {
                LoopKind::Source => run_source_cycle(adapter.as_ref()).await,
                LoopKind::Completion => run_completion_cycle(adapter.as_ref()).await,
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Bridge {}: {:?} loop stopped", adapter.bridge_id(), kind);
    })
}

/// Waits for each task up to `timeout`, aborting the ones that do not finish.
pub async fn join_bounded(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    for handle in handles {
        let abort = handle.abort_handle();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Monitor task ended abnormally: {}", e),
            Err(_) => {
                warn!("Monitor task did not stop within {:?}, aborting", timeout);
                abort.abort();
            }
        }
    }
}
