//! `arcadia-catalog` — inventory item catalog (metadata, pricing, flags).
//!
//! The catalog owns everything about an item **except** its stock quantity,
//! which only the mutation engine may change.

pub mod item;

pub use item::{InventoryItem, ItemDraft, ItemPatch, DEFAULT_LOW_STOCK_THRESHOLD};
