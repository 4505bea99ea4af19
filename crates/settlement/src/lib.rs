//! `arcadia-settlement` — the pure settlement layer.
//!
//! Everything here is deterministic and side-effect free: eligibility and
//! capability checks, request validation, the settlement state machine, and
//! planning (turning a request plus a catalog snapshot into the mutation and
//! loyalty effect to execute). The orchestration that actually commits plans
//! lives in `arcadia-infra`.

pub mod access;
pub mod plan;
pub mod request;
pub mod state;

pub use access::{Capability, Requester};
pub use plan::{LoyaltyEffect, RestockPlan, SalePlan, plan_adjustment, plan_restock, plan_sale};
pub use request::{AdjustmentReason, AdjustmentRequest, RestockRequest, SaleRequest};
pub use state::SettlementState;
