use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use std::sync::Arc;

use arcadia_catalog::{InventoryItem, ItemDraft};
use arcadia_core::{ActorId, ItemId};
use arcadia_infra::{
    InMemoryInventoryStore, InventoryQueries, InventoryStore, MutationEngine,
    SettlementCoordinator,
};
use arcadia_ledger::{EntryMeta, EntryType, Mutation, PaymentMethod};
use arcadia_loyalty::InMemoryLoyaltyLedger;
use arcadia_settlement::{Capability, Requester, RestockRequest, SaleRequest};

fn seeded_store(stock: i64) -> (Arc<InMemoryInventoryStore>, ItemId) {
    let store = Arc::new(InMemoryInventoryStore::new());
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

    if stock > 0 {
        let engine = MutationEngine::new(store.clone());
        engine
            .apply(Mutation {
                item_id,
                delta: stock,
                entry_type: EntryType::Restock,
                meta: EntryMeta::default(),
                idempotency_key: None,
            })
            .unwrap();
    }

    (store, item_id)
}

fn bench_mutation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation_throughput");
    group.throughput(Throughput::Elements(1));
    group.sample_size(1000);

    group.bench_function("restock_commit", |b| {
        let (store, item_id) = seeded_store(0);
        let engine = MutationEngine::new(store);
        b.iter(|| {
            engine
                .apply(Mutation {
                    item_id,
                    delta: black_box(5),
                    entry_type: EntryType::Restock,
                    meta: EntryMeta::default(),
                    idempotency_key: None,
                })
                .unwrap();
        });
    });

    group.bench_function("validated_sale_commit", |b| {
        let (store, item_id) = seeded_store(i64::MAX / 4);
        let engine = MutationEngine::new(store);
        b.iter(|| {
            engine
                .apply(Mutation {
                    item_id,
                    delta: black_box(-1),
                    entry_type: EntryType::Sale,
                    meta: EntryMeta {
                        unit_price_at_entry: Some(100),
                        ..EntryMeta::default()
                    },
                    idempotency_key: None,
                })
                .unwrap();
        });
    });

    group.finish();
}

fn bench_settlement_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlement_latency");
    group.sample_size(1000);

    group.bench_function("cash_sale_end_to_end", |b| {
        let (store, item_id) = seeded_store(i64::MAX / 4);
        let coordinator = SettlementCoordinator::new(
            MutationEngine::new(store),
            Arc::new(InMemoryLoyaltyLedger::new()),
        );
        let staff = Requester::new(ActorId::new(), [Capability::SellItems]);
        let request = SaleRequest {
            item_id,
            quantity: 1,
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            session_id: None,
            notes: None,
            idempotency_key: None,
        };
        b.iter(|| {
            coordinator.sell(&staff, black_box(&request)).unwrap();
        });
    });

    group.bench_function("restock_end_to_end", |b| {
        let (store, item_id) = seeded_store(0);
        let coordinator = SettlementCoordinator::new(
            MutationEngine::new(store),
            Arc::new(InMemoryLoyaltyLedger::new()),
        );
        let staff = Requester::new(ActorId::new(), [Capability::RestockItems]);
        let request = RestockRequest {
            item_id,
            quantity: 10,
            cost_price: None,
            supplier: None,
            notes: None,
            idempotency_key: None,
        };
        b.iter(|| {
            coordinator.restock(&staff, black_box(&request)).unwrap();
        });
    });

    group.finish();
}

fn bench_query_folds(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_folds");

    for entry_count in [100, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("top_selling", entry_count),
            entry_count,
            |b, &count| {
                let (store, item_id) = seeded_store(count * 2);
                let window_start = Utc::now();
                let engine = MutationEngine::new(store.clone());
                for _ in 0..count {
                    engine
                        .apply(Mutation {
                            item_id,
                            delta: -1,
                            entry_type: EntryType::Sale,
                            meta: EntryMeta {
                                unit_price_at_entry: Some(100),
                                ..EntryMeta::default()
                            },
                            idempotency_key: None,
                        })
                        .unwrap();
                }

                let queries = InventoryQueries::new(store);
                b.iter(|| {
                    black_box(queries.top_selling(window_start, 10).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mutation_throughput,
    bench_settlement_latency,
    bench_query_folds
);
criterion_main!(benches);
