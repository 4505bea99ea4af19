use thiserror::Error;

use arcadia_core::DomainError;

use crate::store::StoreError;

/// Failure of a settlement or mutation, as surfaced to callers.
///
/// `Domain` failures are deterministic rejections that committed nothing.
/// `StoreUnavailable` covers infrastructure trouble, including a commit loop
/// that exhausted its retries. `CompensationFailed` means a mutation is in
/// the ledger whose reversal could not be persisted; it is the one condition
/// that requires manual reconciliation and is logged at `error`.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("compensation failed: {0}")]
    CompensationFailed(String),
}

impl SettlementError {
    /// Stable machine-readable kind for wire surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementError::Domain(e) => e.kind(),
            SettlementError::StoreUnavailable(_) => "store_unavailable",
            SettlementError::CompensationFailed(_) => "compensation_failed",
        }
    }
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SettlementError::Domain(DomainError::NotFound),
            StoreError::Conflict(msg) => SettlementError::Domain(DomainError::conflict(msg)),
            StoreError::Unavailable(msg) => SettlementError::StoreUnavailable(msg),
        }
    }
}
