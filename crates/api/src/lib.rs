//! HTTP surface for the inventory ledger and settlement engine.

pub mod app;
pub mod context;
