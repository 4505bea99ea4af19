use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use arcadia_catalog::InventoryItem;
use arcadia_core::ItemId;
use arcadia_ledger::{LedgerEntry, NewLedgerEntry};

/// Inventory store operation error.
///
/// These are infrastructure failures, as opposed to domain rejections.
/// `Conflict` is the optimistic-concurrency retry signal: the caller should
/// re-read and re-validate before committing again.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A catalog row together with its optimistic-concurrency version.
///
/// The version counts committed writes to the row (catalog edits and stock
/// mutations alike); `commit_mutation` re-checks it so that the stock a
/// caller validated against is the stock it commits against.
#[derive(Debug, Clone)]
pub struct VersionedItem {
    pub item: InventoryItem,
    pub version: u64,
}

/// The result of an atomic ledger commit.
#[derive(Debug, Clone)]
pub struct CommittedMutation {
    pub entry: LedgerEntry,
    pub new_stock: i64,
    pub new_version: u64,
}

/// Catalog write-back applied in the same transaction as a restock commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestockPatch {
    pub cost_price: Option<u64>,
    pub supplier: Option<String>,
}

impl RestockPatch {
    pub fn is_empty(&self) -> bool {
        self.cost_price.is_none() && self.supplier.is_none()
    }
}

/// Ledger page selection. Entries are returned newest first; `before_seq`
/// restarts a listing from a previous page's oldest `seq`.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub item_id: Option<ItemId>,
    pub before_seq: Option<u64>,
    pub limit: Option<usize>,
}

impl EntryFilter {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Self::default()
        }
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

/// Transactional persistence for the catalog and the stock ledger.
///
/// One trait owns both tables so that `commit_mutation` can update the
/// materialized stock and append the ledger entry in a single transaction.
///
/// Implementations must:
/// - assign `seq` monotonically across all items (no gaps within a store);
/// - reject `commit_mutation` with `Conflict` when the row version moved;
/// - never mutate or delete committed ledger entries;
/// - reject `delete_item` with `Conflict` while ledger history exists.
pub trait InventoryStore: Send + Sync {
    fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError>;

    fn get_item(&self, item_id: ItemId) -> Result<VersionedItem, StoreError>;

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError>;

    /// Replace the catalog row, conditional on `expected_version`.
    /// Returns the new version.
    fn update_item(&self, item: InventoryItem, expected_version: u64) -> Result<u64, StoreError>;

    /// Soft-retire: the item keeps its ledger history but is no longer
    /// sellable.
    fn retire_item(&self, item_id: ItemId) -> Result<(), StoreError>;

    /// Hard delete. Fails with `Conflict` if any ledger entry references the
    /// item.
    fn delete_item(&self, item_id: ItemId) -> Result<(), StoreError>;

    /// Atomic conditional commit: re-check the item version, apply the entry's
    /// delta to the materialized stock, append exactly one ledger entry, and
    /// (for restocks) apply the catalog write-back. All or nothing.
    fn commit_mutation(
        &self,
        expected_version: u64,
        entry: NewLedgerEntry,
        patch: Option<RestockPatch>,
    ) -> Result<CommittedMutation, StoreError>;

    /// Ledger page, newest first.
    fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError>;

    /// All entries committed at or after `since`, in `seq` order.
    fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Authoritative fold of the item's deltas, for reconciliation against
    /// the materialized `stock_quantity`.
    fn ledger_stock(&self, item_id: ItemId) -> Result<i64, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError> {
        (**self).insert_item(item)
    }

    fn get_item(&self, item_id: ItemId) -> Result<VersionedItem, StoreError> {
        (**self).get_item(item_id)
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_items()
    }

    fn update_item(&self, item: InventoryItem, expected_version: u64) -> Result<u64, StoreError> {
        (**self).update_item(item, expected_version)
    }

    fn retire_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        (**self).retire_item(item_id)
    }

    fn delete_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        (**self).delete_item(item_id)
    }

    fn commit_mutation(
        &self,
        expected_version: u64,
        entry: NewLedgerEntry,
        patch: Option<RestockPatch>,
    ) -> Result<CommittedMutation, StoreError> {
        (**self).commit_mutation(expected_version, entry, patch)
    }

    fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).list_entries(filter)
    }

    fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).entries_since(since)
    }

    fn ledger_stock(&self, item_id: ItemId) -> Result<i64, StoreError> {
        (**self).ledger_stock(item_id)
    }
}
