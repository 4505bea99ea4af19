use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use arcadia_core::{DomainError, DomainResult, ItemId};

/// Applied when a draft does not specify a threshold.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Catalog row for a sellable item.
///
/// `stock_quantity` is a materialized cache of the ledger sum for this item.
/// It is written exclusively by the mutation engine; catalog edits carry the
/// stored value through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub cost_price: Option<u64>,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub is_redeemable: bool,
    /// Points per unit; meaningful only when `is_redeemable`.
    pub points_required: i64,
    pub is_vip_only: bool,
    pub is_promo_active: bool,
    pub expiry_date: Option<NaiveDate>,
    pub supplier: Option<String>,
    /// Soft-retired items keep their ledger history but are no longer sellable.
    pub retired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Build a new catalog row from a validated draft.
    pub fn from_draft(id: ItemId, draft: ItemDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name,
            category: draft.category,
            unit_price: draft.unit_price,
            cost_price: draft.cost_price,
            stock_quantity: 0,
            low_stock_threshold: draft
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            is_redeemable: draft.is_redeemable,
            points_required: draft.points_required,
            is_vip_only: draft.is_vip_only,
            is_promo_active: draft.is_promo_active,
            expiry_date: draft.expiry_date,
            supplier: draft.supplier,
            retired: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a catalog edit. Stock quantity and identity are not editable here.
    pub fn apply_patch(&mut self, patch: ItemPatch, now: DateTime<Utc>) -> DomainResult<()> {
        patch.validate()?;
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(unit_price) = patch.unit_price {
            self.unit_price = unit_price;
        }
        if let Some(cost_price) = patch.cost_price {
            self.cost_price = Some(cost_price);
        }
        if let Some(threshold) = patch.low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        if let Some(redeemable) = patch.is_redeemable {
            self.is_redeemable = redeemable;
        }
        if let Some(points) = patch.points_required {
            self.points_required = points;
        }
        if let Some(vip) = patch.is_vip_only {
            self.is_vip_only = vip;
        }
        if let Some(promo) = patch.is_promo_active {
            self.is_promo_active = promo;
        }
        if let Some(expiry) = patch.expiry_date {
            self.expiry_date = expiry;
        }
        if let Some(supplier) = patch.supplier {
            self.supplier = Some(supplier);
        }
        if self.is_redeemable && self.points_required <= 0 {
            return Err(DomainError::validation(
                "redeemable items require positive points_required",
            ));
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity < self.low_stock_threshold
    }

    /// Days until expiry relative to `today`; negative once expired.
    /// `None` for items without an expiry date.
    pub fn days_until_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date
            .map(|expiry| (expiry - today).num_days())
    }

    /// Total shelf value of the current stock.
    pub fn stock_value(&self) -> u64 {
        self.unit_price.saturating_mul(self.stock_quantity.max(0) as u64)
    }
}

/// Input for creating a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    pub category: String,
    pub unit_price: u64,
    #[serde(default)]
    pub cost_price: Option<u64>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub is_redeemable: bool,
    #[serde(default)]
    pub points_required: i64,
    #[serde(default)]
    pub is_vip_only: bool,
    #[serde(default)]
    pub is_promo_active: bool,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub supplier: Option<String>,
}

impl ItemDraft {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if let Some(threshold) = self.low_stock_threshold {
            if threshold < 0 {
                return Err(DomainError::validation(
                    "low_stock_threshold cannot be negative",
                ));
            }
        }
        if self.points_required < 0 {
            return Err(DomainError::validation("points_required cannot be negative"));
        }
        if self.is_redeemable && self.points_required == 0 {
            return Err(DomainError::validation(
                "redeemable items require positive points_required",
            ));
        }
        Ok(())
    }
}

/// Partial catalog edit. `expiry_date: Some(None)` clears the date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub cost_price: Option<u64>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub is_redeemable: Option<bool>,
    #[serde(default)]
    pub points_required: Option<i64>,
    #[serde(default)]
    pub is_vip_only: Option<bool>,
    #[serde(default)]
    pub is_promo_active: Option<bool>,
    #[serde(default, with = "double_option")]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub supplier: Option<String>,
}

impl ItemPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err(DomainError::validation("category cannot be empty"));
            }
        }
        if let Some(threshold) = self.low_stock_threshold {
            if threshold < 0 {
                return Err(DomainError::validation(
                    "low_stock_threshold cannot be negative",
                ));
            }
        }
        if let Some(points) = self.points_required {
            if points < 0 {
                return Err(DomainError::validation("points_required cannot be negative"));
            }
        }
        Ok(())
    }
}

/// Serde helper distinguishing "absent" from "explicitly null".
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
