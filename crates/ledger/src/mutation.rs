use serde::{Deserialize, Serialize};

use arcadia_core::{DomainError, DomainResult, ItemId};

use crate::entry::{EntryMeta, EntryType};

/// Caller-supplied key protecting a mutation against duplicate application
/// when the same request is retried after a transient failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> DomainResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::validation("idempotency key cannot be empty"));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A validated request to change an item's stock by `delta`.
///
/// The mutation engine turns this into exactly one committed ledger entry,
/// or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub item_id: ItemId,
    pub delta: i64,
    pub entry_type: EntryType,
    pub meta: EntryMeta,
    pub idempotency_key: Option<IdempotencyKey>,
}

/// The non-negative-stock decision kernel.
///
/// Returns the stock after applying `delta`, or the error that rejects the
/// mutation. Pure; the engine is responsible for making the surrounding
/// read-validate-commit atomic.
pub fn checked_new_stock(current: i64, delta: i64) -> DomainResult<i64> {
    if delta == 0 {
        return Err(DomainError::validation("delta cannot be zero"));
    }
    let new_stock = current + delta;
    if new_stock < 0 {
        return Err(DomainError::InsufficientStock {
            available: current,
            requested: -delta,
        });
    }
    Ok(new_stock)
}
