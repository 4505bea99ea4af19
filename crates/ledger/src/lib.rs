//! `arcadia-ledger` — append-only stock ledger types and the mutation kernel.
//!
//! Every stock-affecting operation is recorded as exactly one [`LedgerEntry`].
//! The running sum of `delta` per item, in `seq` order, *is* the item's stock;
//! the catalog's `stock_quantity` column is a materialized cache of that sum.

pub mod entry;
pub mod mutation;

pub use entry::{EntryMeta, EntryType, LedgerEntry, NewLedgerEntry, PaymentMethod};
pub use mutation::{checked_new_stock, IdempotencyKey, Mutation};
