use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use arcadia_catalog::{InventoryItem, ItemDraft, ItemPatch};
use arcadia_core::ItemId;
use arcadia_infra::{
    CategorySummary, EntryFilter, ExpiringItem, InMemoryInventoryStore, InventoryQueries,
    InventoryStats, InventoryStore, MutationEngine, PostgresInventoryStore, SettlementCoordinator,
    SettlementError, SettlementReceipt, StoreError, TopSeller, VersionedItem, ensure_schema,
};
use arcadia_ledger::LedgerEntry;
use arcadia_loyalty::{InMemoryLoyaltyLedger, LoyaltyLedger};
use arcadia_settlement::{AdjustmentRequest, Requester, RestockRequest, SaleRequest};

type DynStore = Arc<dyn InventoryStore>;
type DynLoyalty = Arc<dyn LoyaltyLedger>;

/// The synchronous half of the service layer: store, coordinator, queries.
///
/// The Postgres store bridges to sqlx with `Handle::block_on`, which panics
/// on a runtime worker thread, so nothing here may be called from async
/// context directly.
struct ServiceCore {
    store: DynStore,
    coordinator: SettlementCoordinator<DynStore, DynLoyalty>,
    queries: InventoryQueries<DynStore>,
}

/// Service wiring shared by all handlers.
///
/// The store is selected at startup: in-memory by default, Postgres when
/// `USE_PERSISTENT_STORE` is set (with `DATABASE_URL`). The loyalty ledger
/// is the dev in-memory implementation; a deployment would wire the seam to
/// the customer service instead.
///
/// Every method hops to the blocking pool with `tokio::task::spawn_blocking`
/// before touching the synchronous core.
pub struct AppServices {
    core: Arc<ServiceCore>,
}

pub async fn build_services() -> AppServices {
    let store: DynStore = match std::env::var("USE_PERSISTENT_STORE").as_deref() {
        Ok("1") | Ok("true") => {
            let url = std::env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set when USE_PERSISTENT_STORE is enabled");
            let pool = sqlx::PgPool::connect(&url)
                .await
                .expect("failed to connect to postgres");
            ensure_schema(&pool)
                .await
                .expect("failed to create inventory schema");
            tracing::info!("using persistent inventory store");
            Arc::new(PostgresInventoryStore::new(pool))
        }
        _ => {
            tracing::info!("using in-memory inventory store");
            Arc::new(InMemoryInventoryStore::new())
        }
    };

    let loyalty: DynLoyalty = Arc::new(InMemoryLoyaltyLedger::new());
    AppServices::assemble(store, loyalty)
}

impl AppServices {
    fn assemble(store: DynStore, loyalty: DynLoyalty) -> Self {
        Self {
            core: Arc::new(ServiceCore {
                store: store.clone(),
                coordinator: SettlementCoordinator::new(
                    MutationEngine::new(store.clone()),
                    loyalty,
                ),
                queries: InventoryQueries::new(store),
            }),
        }
    }

    async fn run_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ServiceCore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || f(&core))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }

    async fn run_settlement<T, F>(&self, f: F) -> Result<T, SettlementError>
    where
        F: FnOnce(&ServiceCore) -> Result<T, SettlementError> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || f(&core))
            .await
            .map_err(|e| SettlementError::StoreUnavailable(format!("blocking task failed: {e}")))?
    }

    // Catalog

    pub async fn create_item(&self, draft: ItemDraft) -> Result<InventoryItem, SettlementError> {
        self.run_settlement(move |core| {
            let item = InventoryItem::from_draft(ItemId::new(), draft, Utc::now())
                .map_err(SettlementError::Domain)?;
            core.store.insert_item(item.clone())?;
            Ok(item)
        })
        .await
    }

    pub async fn get_item(&self, item_id: ItemId) -> Result<VersionedItem, StoreError> {
        self.run_store(move |core| core.store.get_item(item_id)).await
    }

    pub async fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        self.run_store(|core| core.store.list_items()).await
    }

    pub async fn update_item(
        &self,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, SettlementError> {
        self.run_settlement(move |core| {
            let versioned = core.store.get_item(item_id)?;
            let mut item = versioned.item;
            item.apply_patch(patch, Utc::now())
                .map_err(SettlementError::Domain)?;
            core.store.update_item(item.clone(), versioned.version)?;
            Ok(item)
        })
        .await
    }

    pub async fn retire_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        self.run_store(move |core| core.store.retire_item(item_id))
            .await
    }

    pub async fn delete_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        self.run_store(move |core| core.store.delete_item(item_id))
            .await
    }

    // Ledger

    pub async fn list_entries(&self, filter: EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        self.run_store(move |core| core.store.list_entries(&filter))
            .await
    }

    // Settlement

    pub async fn sell(
        &self,
        requester: Requester,
        request: SaleRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.run_settlement(move |core| core.coordinator.sell(&requester, &request))
            .await
    }

    pub async fn restock(
        &self,
        requester: Requester,
        request: RestockRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.run_settlement(move |core| core.coordinator.restock(&requester, &request))
            .await
    }

    pub async fn adjust(
        &self,
        requester: Requester,
        request: AdjustmentRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.run_settlement(move |core| core.coordinator.adjust(&requester, &request))
            .await
    }

    // Reports

    pub async fn low_stock(
        &self,
        threshold_override: Option<i64>,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        self.run_store(move |core| core.queries.low_stock(threshold_override))
            .await
    }

    pub async fn expiring(
        &self,
        within_days: i64,
        today: NaiveDate,
    ) -> Result<Vec<ExpiringItem>, StoreError> {
        self.run_store(move |core| core.queries.expiring(within_days, today))
            .await
    }

    pub async fn category_breakdown(&self) -> Result<Vec<CategorySummary>, StoreError> {
        self.run_store(|core| core.queries.category_breakdown())
            .await
    }

    pub async fn top_selling(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopSeller>, StoreError> {
        self.run_store(move |core| core.queries.top_selling(since, limit))
            .await
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<InventoryStats, StoreError> {
        self.run_store(move |core| core.queries.stats(now)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_core::ActorId;
    use arcadia_infra::{CommittedMutation, RestockPatch};
    use arcadia_ledger::{NewLedgerEntry, PaymentMethod};
    use arcadia_settlement::Capability;

    /// Store double that bridges every call through `Handle::block_on`, the
    /// way the Postgres store reaches sqlx. Calling it directly on a runtime
    /// worker thread panics; going through the service layer must not.
    struct BlockOnStore {
        inner: InMemoryInventoryStore,
    }

    impl BlockOnStore {
        fn bridge<T>(
            &self,
            f: impl FnOnce(&InMemoryInventoryStore) -> Result<T, StoreError>,
        ) -> Result<T, StoreError> {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|_| StoreError::Unavailable("no tokio runtime".to_string()))?;
            handle.block_on(async { f(&self.inner) })
        }
    }

    impl InventoryStore for BlockOnStore {
        fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError> {
            self.bridge(move |s| s.insert_item(item))
        }

        fn get_item(&self, item_id: ItemId) -> Result<VersionedItem, StoreError> {
            self.bridge(move |s| s.get_item(item_id))
        }

        fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
            self.bridge(|s| s.list_items())
        }

        fn update_item(
            &self,
            item: InventoryItem,
            expected_version: u64,
        ) -> Result<u64, StoreError> {
            self.bridge(move |s| s.update_item(item, expected_version))
        }

        fn retire_item(&self, item_id: ItemId) -> Result<(), StoreError> {
            self.bridge(move |s| s.retire_item(item_id))
        }

        fn delete_item(&self, item_id: ItemId) -> Result<(), StoreError> {
            self.bridge(move |s| s.delete_item(item_id))
        }

        fn commit_mutation(
            &self,
            expected_version: u64,
            entry: NewLedgerEntry,
            patch: Option<RestockPatch>,
        ) -> Result<CommittedMutation, StoreError> {
            self.bridge(move |s| s.commit_mutation(expected_version, entry, patch))
        }

        fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
            self.bridge(move |s| s.list_entries(filter))
        }

        fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
            self.bridge(move |s| s.entries_since(since))
        }

        fn ledger_stock(&self, item_id: ItemId) -> Result<i64, StoreError> {
            self.bridge(move |s| s.ledger_stock(item_id))
        }
    }

    fn draft(name: &str) -> ItemDraft {
        ItemDraft {
            name: name.to_string(),
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
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn block_on_backed_store_settles_from_async_context() {
        let store: DynStore = Arc::new(BlockOnStore {
            inner: InMemoryInventoryStore::new(),
        });
        let loyalty: DynLoyalty = Arc::new(InMemoryLoyaltyLedger::new());
        let services = AppServices::assemble(store, loyalty);

        let staff = Requester::new(
            ActorId::new(),
            [Capability::SellItems, Capability::RestockItems],
        );

        let item = services.create_item(draft("Soda")).await.unwrap();
        services
            .restock(
                staff.clone(),
                RestockRequest {
                    item_id: item.id,
                    quantity: 10,
                    cost_price: None,
                    supplier: None,
                    notes: None,
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();

        let receipt = services
            .sell(
                staff,
                SaleRequest {
                    item_id: item.id,
                    quantity: 3,
                    payment_method: PaymentMethod::Cash,
                    customer_id: None,
                    session_id: None,
                    notes: None,
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.new_stock, 7);
        let stats = services.stats(Utc::now()).await.unwrap();
        assert_eq!(stats.transactions_today, 1);
    }
}
