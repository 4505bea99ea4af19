//! Request bodies and JSON mapping helpers.
//!
//! Settlement bodies omit the item id (it comes from the path) and are
//! converted into the full request types before they reach the coordinator.
//! `POST /sales` takes a [`SaleRequest`] body directly.

use serde::Deserialize;
use serde_json::{Value, json};

use arcadia_core::ItemId;
use arcadia_infra::SettlementReceipt;
use arcadia_ledger::IdempotencyKey;
use arcadia_settlement::{AdjustmentReason, AdjustmentRequest, LoyaltyEffect, RestockRequest};

#[derive(Debug, Deserialize)]
pub struct RestockBody {
    pub quantity: i64,
    #[serde(default)]
    pub cost_price: Option<u64>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl RestockBody {
    pub fn into_request(self, item_id: ItemId) -> RestockRequest {
        RestockRequest {
            item_id,
            quantity: self.quantity,
            cost_price: self.cost_price,
            supplier: self.supplier,
            notes: self.notes,
            idempotency_key: self.idempotency_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustBody {
    pub delta: i64,
    pub reason: AdjustmentReason,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl AdjustBody {
    pub fn into_request(self, item_id: ItemId) -> AdjustmentRequest {
        AdjustmentRequest {
            item_id,
            delta: self.delta,
            reason: self.reason,
            notes: self.notes,
            idempotency_key: self.idempotency_key,
        }
    }
}

pub fn receipt_json(receipt: &SettlementReceipt) -> Value {
    json!({
        "entry_id": receipt.entry_id,
        "new_stock": receipt.new_stock,
        "state": receipt.state.to_string(),
        "loyalty": loyalty_json(&receipt.loyalty),
        "replayed": receipt.replayed,
    })
}

fn loyalty_json(effect: &LoyaltyEffect) -> Value {
    match effect {
        LoyaltyEffect::None => Value::Null,
        LoyaltyEffect::Earn {
            customer_id,
            points,
        } => json!({ "effect": "earn", "customer_id": customer_id, "points": points }),
        LoyaltyEffect::Redeem {
            customer_id,
            points,
        } => json!({ "effect": "redeem", "customer_id": customer_id, "points": points }),
    }
}
