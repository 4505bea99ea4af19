use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, warn};

use arcadia_core::{DomainError, EntryId};
use arcadia_ledger::{EntryType, IdempotencyKey, Mutation, NewLedgerEntry, checked_new_stock};

use crate::error::SettlementError;
use crate::store::{InventoryStore, RestockPatch, StoreError};

/// Conflict retries before a commit is given up as unavailable.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// The result of applying a mutation.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub entry_id: EntryId,
    pub new_stock: i64,
    /// True when an idempotency key matched a previous commit and the stored
    /// outcome was returned without writing anything.
    pub replayed: bool,
}

/// The sole writer of stock.
///
/// Every stock change flows through `apply`: read the item, validate the
/// delta against the non-negativity rule, and commit conditionally on the
/// version that was read. A concurrent commit on the same item surfaces as
/// `StoreError::Conflict` and the loop re-reads and re-validates, so two
/// concurrent sales of the last unit can never both pass validation against
/// the same state.
pub struct MutationEngine<S: InventoryStore> {
    store: S,
    committed_keys: Mutex<HashMap<String, MutationOutcome>>,
}

impl<S: InventoryStore> MutationEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            committed_keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drop a recorded commit from the idempotency registry. Called when the
    /// commit behind the key is reversed (compensation): a retry must then
    /// re-execute instead of replaying an outcome that no longer stands.
    pub fn forget_key(&self, key: &IdempotencyKey) {
        if let Ok(mut keys) = self.committed_keys.lock() {
            keys.remove(key.as_str());
        }
    }

    /// Apply a validated mutation, producing exactly one ledger entry or
    /// nothing at all.
    pub fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, SettlementError> {
        self.apply_with_patch(mutation, None)
    }

    /// `apply`, with a catalog write-back committed in the same transaction
    /// (used by restocks for cost/supplier updates).
    pub fn apply_with_patch(
        &self,
        mutation: Mutation,
        patch: Option<RestockPatch>,
    ) -> Result<MutationOutcome, SettlementError> {
        if let Some(key) = &mutation.idempotency_key {
            let committed = self
                .committed_keys
                .lock()
                .map_err(|_| SettlementError::StoreUnavailable("lock poisoned".to_string()))?;
            if let Some(outcome) = committed.get(key.as_str()) {
                debug!(key = key.as_str(), "replaying previously committed mutation");
                return Ok(MutationOutcome {
                    replayed: true,
                    ..outcome.clone()
                });
            }
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let versioned = self.store.get_item(mutation.item_id)?;

            if mutation.entry_type == EntryType::Sale && versioned.item.retired {
                return Err(DomainError::not_eligible("item is retired").into());
            }
            checked_new_stock(versioned.item.stock_quantity, mutation.delta)
                .map_err(SettlementError::Domain)?;

            let entry = NewLedgerEntry {
                item_id: mutation.item_id,
                delta: mutation.delta,
                entry_type: mutation.entry_type,
                meta: mutation.meta.clone(),
            };

            match self
                .store
                .commit_mutation(versioned.version, entry, patch.clone())
            {
                Ok(committed) => {
                    let outcome = MutationOutcome {
                        entry_id: committed.entry.id,
                        new_stock: committed.new_stock,
                        replayed: false,
                    };
                    if let Some(key) = &mutation.idempotency_key {
                        let mut keys = self.committed_keys.lock().map_err(|_| {
                            SettlementError::StoreUnavailable("lock poisoned".to_string())
                        })?;
                        keys.insert(key.as_str().to_string(), outcome.clone());
                    }
                    return Ok(outcome);
                }
                Err(StoreError::Conflict(msg)) => {
                    debug!(
                        item_id = %mutation.item_id,
                        attempt,
                        %msg,
                        "commit lost the race, re-reading"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(
            item_id = %mutation.item_id,
            attempts = MAX_COMMIT_ATTEMPTS,
            "giving up after repeated commit conflicts"
        );
        Err(SettlementError::StoreUnavailable(format!(
            "commit conflicted {MAX_COMMIT_ATTEMPTS} times on item {}",
            mutation.item_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryInventoryStore;
    use arcadia_catalog::{InventoryItem, ItemDraft};
    use arcadia_core::ItemId;
    use arcadia_ledger::{EntryMeta, IdempotencyKey};
    use chrono::Utc;

    fn engine_with_stock(stock: i64) -> (MutationEngine<InMemoryInventoryStore>, ItemId) {
        let store = InMemoryInventoryStore::new();
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
        let item_id = item.id;
        store.insert_item(item).unwrap();
        let engine = MutationEngine::new(store);
        if stock > 0 {
            engine
                .apply(restock(item_id, stock))
                .expect("seed restock");
        }
        (engine, item_id)
    }

    fn restock(item_id: ItemId, delta: i64) -> Mutation {
        Mutation {
            item_id,
            delta,
            entry_type: EntryType::Restock,
            meta: EntryMeta::default(),
            idempotency_key: None,
        }
    }

    fn sale(item_id: ItemId, quantity: i64) -> Mutation {
        Mutation {
            item_id,
            delta: -quantity,
            entry_type: EntryType::Sale,
            meta: EntryMeta {
                unit_price_at_entry: Some(100),
                ..EntryMeta::default()
            },
            idempotency_key: None,
        }
    }

    #[test]
    fn oversell_is_rejected_with_zero_effect() {
        let (engine, item_id) = engine_with_stock(10);

        let err = engine.apply(sale(item_id, 20)).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::InsufficientStock {
                available: 10,
                requested: 20,
            })
        ));

        let item = engine.store().get_item(item_id).unwrap().item;
        assert_eq!(item.stock_quantity, 10);
        assert_eq!(engine.store().ledger_stock(item_id).unwrap(), 10);
    }

    #[test]
    fn unknown_item_is_not_found() {
        let (engine, _) = engine_with_stock(0);
        let err = engine.apply(sale(ItemId::new(), 1)).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::NotFound)
        ));
    }

    #[test]
    fn retired_item_rejects_sales_but_not_adjustments() {
        let (engine, item_id) = engine_with_stock(5);
        engine.store().retire_item(item_id).unwrap();

        let err = engine.apply(sale(item_id, 1)).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::NotEligible(_))
        ));

        let adjustment = Mutation {
            item_id,
            delta: -5,
            entry_type: EntryType::Adjustment,
            meta: EntryMeta::default(),
            idempotency_key: None,
        };
        assert_eq!(engine.apply(adjustment).unwrap().new_stock, 0);
    }

    #[test]
    fn idempotent_replay_returns_original_outcome_without_a_new_entry() {
        let (engine, item_id) = engine_with_stock(10);

        let key = IdempotencyKey::new("sale-0001").unwrap();
        let mut mutation = sale(item_id, 3);
        mutation.idempotency_key = Some(key);

        let first = engine.apply(mutation.clone()).unwrap();
        let second = engine.apply(mutation).unwrap();

        assert_eq!(first.entry_id, second.entry_id);
        assert_eq!(first.new_stock, 7);
        assert_eq!(second.new_stock, 7);
        assert!(!first.replayed);
        assert!(second.replayed);

        let item = engine.store().get_item(item_id).unwrap().item;
        assert_eq!(item.stock_quantity, 7);
        assert_eq!(engine.store().ledger_stock(item_id).unwrap(), 7);
    }

    #[test]
    fn exact_sellout_succeeds_and_next_sale_fails() {
        let (engine, item_id) = engine_with_stock(3);

        assert_eq!(engine.apply(sale(item_id, 3)).unwrap().new_stock, 0);
        let err = engine.apply(sale(item_id, 1)).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Domain(DomainError::InsufficientStock {
                available: 0,
                requested: 1,
            })
        ));
    }
}
