//! `arcadia-loyalty` — seam to the customer/loyalty service.
//!
//! The point balance is owned by that service, not by this repository; the
//! settlement coordinator only appends transactions and reads balances/tiers
//! through the [`LoyaltyLedger`] trait. The in-memory implementation exists
//! for dev wiring and tests.

pub mod ledger;

pub use ledger::{
    EarnRate, InMemoryLoyaltyLedger, LoyaltyError, LoyaltyLedger, LoyaltyTier,
    LoyaltyTransaction, TransactionType,
};
