//! Transfer State Machine
//!
//! The happy path is a strict chain of six states; each may only advance to the
//! next one. FAILED, CANCELLED and DISPUTED are terminal sinks with their own
//! entry rules. COMPLETED is terminal too.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Initiated,
    PendingSourceConfirmation,
    SourceConfirmed,
    PendingValidation,
    Validated,
    Completed,
    Failed,
    Cancelled,
    Disputed,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 9] = [
        TransferStatus::Initiated,
        TransferStatus::PendingSourceConfirmation,
        TransferStatus::SourceConfirmed,
        TransferStatus::PendingValidation,
        TransferStatus::Validated,
        TransferStatus::Completed,
        TransferStatus::Failed,
        TransferStatus::Cancelled,
        TransferStatus::Disputed,
    ];

    /// Position on the forward path, `None` for the sinks that are not on it.
    fn rank(self) -> Option<u8> {
        match self {
            TransferStatus::Initiated => Some(0),
            TransferStatus::PendingSourceConfirmation => Some(1),
            TransferStatus::SourceConfirmed => Some(2),
            TransferStatus::PendingValidation => Some(3),
            TransferStatus::Validated => Some(4),
            TransferStatus::Completed => Some(5),
            TransferStatus::Failed | TransferStatus::Cancelled | TransferStatus::Disputed => None,
        }
    }

    /// Records in a terminal state are never modified again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed
                | TransferStatus::Failed
                | TransferStatus::Cancelled
                | TransferStatus::Disputed
        )
    }

    /// Returns true when `self -> next` is an edge of the transfer graph.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TransferStatus::Failed => true,
            TransferStatus::Cancelled => self == TransferStatus::Initiated,
            TransferStatus::Disputed => self == TransferStatus::Validated,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Initiated => "INITIATED",
            TransferStatus::PendingSourceConfirmation => "PENDING_SOURCE_CONFIRMATION",
            TransferStatus::SourceConfirmed => "SOURCE_CONFIRMED",
            TransferStatus::PendingValidation => "PENDING_VALIDATION",
            TransferStatus::Validated => "VALIDATED",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
            TransferStatus::Cancelled => "CANCELLED",
            TransferStatus::Disputed => "DISPUTED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
