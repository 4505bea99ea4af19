use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arcadia_core::{ActorId, CustomerId, EntryId, ItemId, SessionId};

/// Kind of stock-affecting event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Sale,
    Restock,
    Adjustment,
    Expired,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Sale => "sale",
            EntryType::Restock => "restock",
            EntryType::Adjustment => "adjustment",
            EntryType::Expired => "expired",
        }
    }
}

impl core::fmt::Display for EntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a sale was paid.
///
/// `Split` is part cash, part M-Pesa; for loyalty accrual it counts as a
/// fully paid tender, same as `Cash` and `Mpesa`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Mpesa,
    LoyaltyPoints,
    Split,
}

impl PaymentMethod {
    /// Whether this method represents paid tender (earns points) as opposed
    /// to a points redemption.
    pub fn is_paid_tender(&self) -> bool {
        !matches!(self, PaymentMethod::LoyaltyPoints)
    }
}

/// Optional context attached to a ledger entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Price snapshot for revenue attribution (set for sales).
    pub unit_price_at_entry: Option<u64>,
    pub related_session_id: Option<SessionId>,
    pub related_customer_id: Option<CustomerId>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub performed_by: Option<ActorId>,
}

/// A stock event ready to be appended (id/seq/timestamp not yet assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub item_id: ItemId,
    /// Signed stock change; positive adds stock, negative removes it.
    pub delta: i64,
    pub entry_type: EntryType,
    #[serde(flatten)]
    pub meta: EntryMeta,
}

/// A committed ledger entry. Immutable once written.
///
/// `seq` is assigned by the store and is globally monotonic; it is the
/// authoritative replay order (and the pagination cursor). `created_at` is
/// assigned at commit time by the same store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub seq: u64,
    pub item_id: ItemId,
    pub delta: i64,
    pub entry_type: EntryType,
    #[serde(flatten)]
    pub meta: EntryMeta,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Revenue attributed to this entry (sales only; other kinds carry none).
    pub fn revenue(&self) -> u64 {
        if self.entry_type != EntryType::Sale {
            return 0;
        }
        self.meta
            .unit_price_at_entry
            .unwrap_or(0)
            .saturating_mul(self.delta.unsigned_abs())
    }

    /// Units sold, for sale entries (sale deltas are negative).
    pub fn units_sold(&self) -> i64 {
        if self.entry_type == EntryType::Sale {
            -self.delta
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_entry(delta: i64, unit_price: Option<u64>) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::new(),
            seq: 1,
            item_id: ItemId::new(),
            delta,
            entry_type: EntryType::Sale,
            meta: EntryMeta {
                unit_price_at_entry: unit_price,
                ..EntryMeta::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sale_revenue_uses_price_snapshot() {
        let entry = sale_entry(-3, Some(100));
        assert_eq!(entry.revenue(), 300);
        assert_eq!(entry.units_sold(), 3);
    }

    #[test]
    fn non_sale_entries_carry_no_revenue() {
        let mut entry = sale_entry(-2, Some(100));
        entry.entry_type = EntryType::Expired;
        assert_eq!(entry.revenue(), 0);
        assert_eq!(entry.units_sold(), 0);
    }

    #[test]
    fn entry_type_round_trips_through_serde() {
        let json = serde_json::to_string(&EntryType::Restock).unwrap();
        assert_eq!(json, "\"restock\"");
        let back: EntryType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntryType::Restock);
    }
}
