use serde::{Deserialize, Serialize};

use arcadia_core::{CustomerId, DomainError, DomainResult, ItemId, SessionId};
use arcadia_ledger::{EntryType, IdempotencyKey, PaymentMethod};

/// A request to sell `quantity` units of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl SaleRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.payment_method == PaymentMethod::LoyaltyPoints && self.customer_id.is_none() {
            return Err(DomainError::validation(
                "loyalty-points payment requires a customer",
            ));
        }
        Ok(())
    }
}

/// A request to receive `quantity` units into stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    /// New per-unit cost, written back to the catalog row when present.
    #[serde(default)]
    pub cost_price: Option<u64>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl RestockRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(())
    }
}

/// Why a manual adjustment is being made.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// Stocktake correction, breakage, and similar. Signed delta.
    Correction,
    /// Expired goods written off. Delta must remove stock.
    Expired,
}

impl AdjustmentReason {
    pub fn entry_type(&self) -> EntryType {
        match self {
            AdjustmentReason::Correction => EntryType::Adjustment,
            AdjustmentReason::Expired => EntryType::Expired,
        }
    }
}

/// A manual stock adjustment with a signed delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub item_id: ItemId,
    pub delta: i64,
    pub reason: AdjustmentReason,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl AdjustmentRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if self.reason == AdjustmentReason::Expired && self.delta >= 0 {
            return Err(DomainError::validation(
                "expiry write-offs must remove stock",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loyalty_sale_without_customer_is_rejected() {
        let request = SaleRequest {
            item_id: ItemId::new(),
            quantity: 1,
            payment_method: PaymentMethod::LoyaltyPoints,
            customer_id: None,
            session_id: None,
            notes: None,
            idempotency_key: None,
        };
        assert!(matches!(
            request.validate().unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn expired_adjustment_must_remove_stock() {
        let request = AdjustmentRequest {
            item_id: ItemId::new(),
            delta: 2,
            reason: AdjustmentReason::Expired,
            notes: None,
            idempotency_key: None,
        };
        assert!(request.validate().is_err());

        let request = AdjustmentRequest {
            delta: -2,
            ..request
        };
        assert!(request.validate().is_ok());
    }
}
