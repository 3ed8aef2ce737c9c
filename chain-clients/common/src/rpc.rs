//! JSON-RPC Transport
//!
//! A thin JSON-RPC 2.0 client shared by every chain backend. Each request carries the
//! HTTP timeout configured at construction, and read-only calls go through a bounded
//! retry-with-backoff policy. Transaction submissions use [`JsonRpcClient::call_once`]
//! so a lost response never turns into a second broadcast from this layer.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ChainError;

// ============================================================================
// WIRE STRUCTURES
// ============================================================================

/// JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [serde_json::Value],
    id: u64,
}

/// JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

// ============================================================================
// RETRY POLICY
// ============================================================================

/// Bounded exponential backoff for transient chain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << exponent);
        delay.min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails terminally, or the attempt budget is spent.
    ///
    /// # Arguments
    ///
    /// * `label` - Operation name used in log lines
    /// * `op` - Closure producing a fresh future per attempt
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful result
    /// * `Err(ChainError)` - A terminal error, or the last transient error
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// JSON-RPC client bound to one endpoint.
pub struct JsonRpcClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
    bearer_token: Option<String>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Creates a client for `url` with a per-request timeout.
    ///
    /// # Arguments
    ///
    /// * `url` - Node endpoint (e.g., "http://127.0.0.1:8545")
    /// * `timeout` - Per-request timeout
    /// * `retry` - Retry policy for read-only calls
    ///
    /// # Returns
    ///
    /// * `Ok(JsonRpcClient)` - Client ready to use
    /// * `Err(ChainError)` - The HTTP client could not be built
    pub fn new(url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| ChainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            retry,
            bearer_token: None,
            next_id: AtomicU64::new(1),
        })
    }

    /// Attaches an `Authorization: Bearer` token to every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Calls `method` with retries on transient errors.
    ///
    /// A `null` result is returned as `Ok(None)`; several chains use it for
    /// "not found yet".
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>, ChainError> {
        self.retry
            .run(method, || self.send::<T>(method, &params))
            .await
    }

    /// Calls `method` exactly once.
    pub async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>, ChainError> {
        self.send::<T>(method, &params).await
    }

    /// Like [`JsonRpcClient::call`] but a `null` result is an error.
    pub async fn call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, ChainError> {
        self.call(method, params).await?.ok_or_else(|| {
            ChainError::InvalidResponse(format!("{} returned no result from {}", method, self.url))
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<Option<T>, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_http_status(&self.url, status));
        }

        let body: JsonRpcResponse<T> = response.json().await.map_err(|e| {
            ChainError::InvalidResponse(format!(
                "Failed to parse {} response from {}: {}",
                method, self.url, e
            ))
        })?;

        if let Some(error) = body.error {
            debug!("{} returned JSON-RPC error {}: {}", method, error.code, error.message);
            return Err(ChainError::from_rpc(error.code, error.message));
        }

        Ok(body.result)
    }

    fn map_transport(&self, e: reqwest::Error) -> ChainError {
        if e.is_timeout() {
            ChainError::Timeout {
                endpoint: self.url.clone(),
            }
        } else {
            ChainError::Transport {
                endpoint: self.url.clone(),
                message: e.to_string(),
            }
        }
    }
}

fn classify_http_status(url: &str, status: StatusCode) -> ChainError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ChainError::Transport {
            endpoint: url.to_string(),
            message: format!("HTTP {}", status),
        }
    } else {
        ChainError::Rpc {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {} from {}", status, url),
        }
    }
}
