use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use arcadia_catalog::InventoryItem;
use arcadia_core::{EntryId, ItemId};
use arcadia_ledger::{LedgerEntry, NewLedgerEntry};

use super::r#trait::{
    CommittedMutation, EntryFilter, InventoryStore, RestockPatch, StoreError, VersionedItem,
};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<ItemId, VersionedItem>,
    entries: Vec<LedgerEntry>,
    next_seq: u64,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Not optimized for performance. The single write
/// lock makes every commit trivially atomic; version checks still behave
/// exactly as the Postgres implementation so the engine's retry loop is
/// exercised the same way.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        if inner.items.contains_key(&item.id) {
            return Err(StoreError::Conflict(format!(
                "item {} already exists",
                item.id
            )));
        }
        inner
            .items
            .insert(item.id, VersionedItem { item, version: 1 });
        Ok(())
    }

    fn get_item(&self, item_id: ItemId) -> Result<VersionedItem, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        inner
            .items
            .get(&item_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut items: Vec<InventoryItem> =
            inner.items.values().map(|v| v.item.clone()).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn update_item(&self, item: InventoryItem, expected_version: u64) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let versioned = inner.items.get_mut(&item.id).ok_or(StoreError::NotFound)?;
        if versioned.version != expected_version {
            return Err(StoreError::Conflict(format!(
                "expected version {expected_version}, found {}",
                versioned.version
            )));
        }
        versioned.item = item;
        versioned.version += 1;
        Ok(versioned.version)
    }

    fn retire_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let versioned = inner.items.get_mut(&item_id).ok_or(StoreError::NotFound)?;
        versioned.item.retired = true;
        versioned.item.updated_at = Utc::now();
        versioned.version += 1;
        Ok(())
    }

    fn delete_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        if !inner.items.contains_key(&item_id) {
            return Err(StoreError::NotFound);
        }
        if inner.entries.iter().any(|e| e.item_id == item_id) {
            return Err(StoreError::Conflict(
                "item has ledger history; retire it instead".to_string(),
            ));
        }
        inner.items.remove(&item_id);
        Ok(())
    }

    fn commit_mutation(
        &self,
        expected_version: u64,
        entry: NewLedgerEntry,
        patch: Option<RestockPatch>,
    ) -> Result<CommittedMutation, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        let seq = inner.next_seq + 1;
        let versioned = inner
            .items
            .get_mut(&entry.item_id)
            .ok_or(StoreError::NotFound)?;
        if versioned.version != expected_version {
            return Err(StoreError::Conflict(format!(
                "expected version {expected_version}, found {}",
                versioned.version
            )));
        }

        let now = Utc::now();
        versioned.item.stock_quantity += entry.delta;
        if let Some(patch) = patch {
            if let Some(cost_price) = patch.cost_price {
                versioned.item.cost_price = Some(cost_price);
            }
            if let Some(supplier) = patch.supplier {
                versioned.item.supplier = Some(supplier);
            }
        }
        versioned.item.updated_at = now;
        versioned.version += 1;

        let new_stock = versioned.item.stock_quantity;
        let new_version = versioned.version;

        let committed = LedgerEntry {
            id: EntryId::new(),
            seq,
            item_id: entry.item_id,
            delta: entry.delta,
            entry_type: entry.entry_type,
            meta: entry.meta,
            created_at: now,
        };
        inner.next_seq = seq;
        inner.entries.push(committed.clone());

        Ok(CommittedMutation {
            entry: committed,
            new_stock,
            new_version,
        })
    }

    fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let mut page: Vec<LedgerEntry> = inner
            .entries
            .iter()
            .filter(|e| filter.item_id.is_none_or(|id| e.item_id == id))
            .filter(|e| filter.before_seq.is_none_or(|cursor| e.seq < cursor))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.seq.cmp(&a.seq));
        page.truncate(filter.effective_limit());
        Ok(page)
    }

    fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.created_at >= since)
            .cloned()
            .collect())
    }

    fn ledger_stock(&self, item_id: ItemId) -> Result<i64, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.item_id == item_id)
            .map(|e| e.delta)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_catalog::ItemDraft;
    use arcadia_ledger::{EntryMeta, EntryType};
    use proptest::prelude::*;

    fn seeded_item(store: &InMemoryInventoryStore) -> VersionedItem {
        let draft = ItemDraft {
            name: "Soda".to_string(),
            category: "drinks".to_string(),
            unit_price: 100,
            cost_price: None,
            low_stock_threshold: None,
            is_redeemable: false,
            points_required: 0,
            is_vip_only: false,
            is_promo_active: false,
            expiry_date: None,
            supplier: None,
        };
        let item = InventoryItem::from_draft(ItemId::new(), draft, Utc::now()).unwrap();
        store.insert_item(item.clone()).unwrap();
        store.get_item(item.id).unwrap()
    }

    fn restock_entry(item_id: ItemId, delta: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            item_id,
            delta,
            entry_type: EntryType::Restock,
            meta: EntryMeta::default(),
        }
    }

    #[test]
    fn commit_bumps_version_and_assigns_monotonic_seq() {
        let store = InMemoryInventoryStore::new();
        let versioned = seeded_item(&store);

        let first = store
            .commit_mutation(versioned.version, restock_entry(versioned.item.id, 10), None)
            .unwrap();
        let second = store
            .commit_mutation(first.new_version, restock_entry(versioned.item.id, 5), None)
            .unwrap();

        assert_eq!(first.entry.seq, 1);
        assert_eq!(second.entry.seq, 2);
        assert_eq!(second.new_stock, 15);
        assert_eq!(second.new_version, versioned.version + 2);
    }

    #[test]
    fn stale_version_is_a_conflict_and_commits_nothing() {
        let store = InMemoryInventoryStore::new();
        let versioned = seeded_item(&store);

        store
            .commit_mutation(versioned.version, restock_entry(versioned.item.id, 10), None)
            .unwrap();
        let err = store
            .commit_mutation(versioned.version, restock_entry(versioned.item.id, 5), None)
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get_item(versioned.item.id).unwrap().item.stock_quantity, 10);
        assert_eq!(store.ledger_stock(versioned.item.id).unwrap(), 10);
    }

    #[test]
    fn delete_is_rejected_while_ledger_history_exists() {
        let store = InMemoryInventoryStore::new();
        let versioned = seeded_item(&store);

        store
            .commit_mutation(versioned.version, restock_entry(versioned.item.id, 1), None)
            .unwrap();
        let err = store.delete_item(versioned.item.id).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.retire_item(versioned.item.id).unwrap();
        assert!(store.get_item(versioned.item.id).unwrap().item.retired);
    }

    #[test]
    fn list_entries_pages_newest_first_with_cursor() {
        let store = InMemoryInventoryStore::new();
        let versioned = seeded_item(&store);

        let mut version = versioned.version;
        for _ in 0..5 {
            version = store
                .commit_mutation(version, restock_entry(versioned.item.id, 1), None)
                .unwrap()
                .new_version;
        }

        let filter = EntryFilter {
            item_id: Some(versioned.item.id),
            before_seq: None,
            limit: Some(2),
        };
        let first_page = store.list_entries(&filter).unwrap();
        assert_eq!(
            first_page.iter().map(|e| e.seq).collect::<Vec<_>>(),
            vec![5, 4]
        );

        let filter = EntryFilter {
            before_seq: first_page.last().map(|e| e.seq),
            ..filter
        };
        let second_page = store.list_entries(&filter).unwrap();
        assert_eq!(
            second_page.iter().map(|e| e.seq).collect::<Vec<_>>(),
            vec![3, 2]
        );
    }

    #[test]
    fn restock_patch_applies_with_the_commit() {
        let store = InMemoryInventoryStore::new();
        let versioned = seeded_item(&store);

        let patch = RestockPatch {
            cost_price: Some(60),
            supplier: Some("Acme Distributors".to_string()),
        };
        store
            .commit_mutation(
                versioned.version,
                restock_entry(versioned.item.id, 10),
                Some(patch),
            )
            .unwrap();

        let item = store.get_item(versioned.item.id).unwrap().item;
        assert_eq!(item.cost_price, Some(60));
        assert_eq!(item.supplier.as_deref(), Some("Acme Distributors"));
    }

    proptest! {
        /// The materialized stock always equals the ledger fold, whatever
        /// sequence of deltas is committed.
        #[test]
        fn materialized_stock_matches_ledger_fold(deltas in proptest::collection::vec(1i64..20, 1..16)) {
            let store = InMemoryInventoryStore::new();
            let versioned = seeded_item(&store);

            let mut version = versioned.version;
            for delta in deltas {
                version = store
                    .commit_mutation(version, restock_entry(versioned.item.id, delta), None)
                    .unwrap()
                    .new_version;
            }

            let item = store.get_item(versioned.item.id).unwrap().item;
            prop_assert_eq!(item.stock_quantity, store.ledger_stock(versioned.item.id).unwrap());
        }
    }
}
