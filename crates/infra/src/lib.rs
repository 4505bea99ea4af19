//! `arcadia-infra` — the transactional boundary of the inventory engine.
//!
//! Owns the `InventoryStore` trait (in-memory and Postgres implementations),
//! the `MutationEngine` (the sole writer of stock), the
//! `SettlementCoordinator` (commit-or-compensate orchestration of mutations
//! and loyalty effects), and the read-side `InventoryQueries`.

pub mod engine;
pub mod error;
pub mod queries;
pub mod settlement;
pub mod store;


pub use engine::{MutationEngine, MutationOutcome};
pub use error::SettlementError;
pub use queries::{
    CategorySummary, ExpiringItem, InventoryQueries, InventoryStats, TopSeller,
};
pub use settlement::{SettlementCoordinator, SettlementReceipt};
pub use store::{
    CommittedMutation, EntryFilter, InMemoryInventoryStore, InventoryStore,
    PostgresInventoryStore, RestockPatch, StoreError, VersionedItem, ensure_schema,
};
