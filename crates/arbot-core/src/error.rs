//! Error types for the settlement engine.
//!
//! Contract violations (a `now` earlier than the settlement reference,
//! compounding overflow) are programming errors and panic instead of
//! surfacing here; see the ledger. These enums cover the recoverable
//! persistence-side taxonomy only.

use thiserror::Error;

use crate::types::UserId;

/// Persistence-layer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("stale snapshot for {0}: settlement already advanced")]
    StaleSnapshot(UserId),
    #[error("duplicate cycle {index} for {user}")]
    DuplicateCycle { user: UserId, index: u64 },
    #[error("lock timeout for {0}")]
    LockTimeout(UserId),
    #[error("storage: {0}")]
    Storage(String),
}

impl StoreError {
    /// A concurrent settlement won the race; re-reading resolves it.
    pub fn is_benign_conflict(&self) -> bool {
        matches!(self, Self::StaleSnapshot(_) | Self::DuplicateCycle { .. })
    }

    /// Worth retrying on the next sweep or page load.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_) | Self::Storage(_))
    }
}

/// Runner-level failures surfaced to the trigger layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("settlement for {user} still contended after {attempts} attempts")]
    Contended { user: UserId, attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}
