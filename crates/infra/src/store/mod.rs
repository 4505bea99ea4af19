mod in_memory;
mod postgres;
#[allow(clippy::module_inception)]
mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::{PostgresInventoryStore, ensure_schema};
pub use r#trait::{
    CommittedMutation, EntryFilter, InventoryStore, RestockPatch, StoreError, VersionedItem,
};
