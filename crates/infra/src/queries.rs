use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use arcadia_catalog::InventoryItem;
use arcadia_core::ItemId;
use arcadia_ledger::EntryType;

use crate::store::{InventoryStore, StoreError};

/// An item close to (or past) its expiry date.
#[derive(Debug, Clone, Serialize)]
pub struct ExpiringItem {
    pub item: InventoryItem,
    /// Negative once expired.
    pub days_left: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub item_count: usize,
    pub total_stock: i64,
    pub total_value: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSeller {
    pub item_id: ItemId,
    pub name: String,
    pub units_sold: i64,
    pub revenue: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryStats {
    pub total_items: usize,
    pub total_value: u64,
    pub low_stock_count: usize,
    pub promo_items_count: usize,
    pub revenue_today: u64,
    pub transactions_today: usize,
}

/// Read-side folds over the store. Pure derivations; nothing here writes.
pub struct InventoryQueries<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> InventoryQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Active items below their low-stock threshold (or a caller-supplied
    /// override), lowest stock first.
    pub fn low_stock(
        &self,
        threshold_override: Option<i64>,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let mut items: Vec<InventoryItem> = self
            .store
            .list_items()?
            .into_iter()
            .filter(|item| !item.retired)
            .filter(|item| {
                let threshold = threshold_override.unwrap_or(item.low_stock_threshold);
                item.stock_quantity < threshold
            })
            .collect();
        items.sort_by_key(|item| item.stock_quantity);
        Ok(items)
    }

    /// Active items expiring within `within_days` of `today`, soonest first.
    /// Already-expired items are included (negative `days_left`); items with
    /// no expiry date are not.
    pub fn expiring(
        &self,
        within_days: i64,
        today: NaiveDate,
    ) -> Result<Vec<ExpiringItem>, StoreError> {
        let mut expiring: Vec<ExpiringItem> = self
            .store
            .list_items()?
            .into_iter()
            .filter(|item| !item.retired)
            .filter_map(|item| {
                let days_left = item.days_until_expiry(today)?;
                (days_left <= within_days).then_some(ExpiringItem { item, days_left })
            })
            .collect();
        expiring.sort_by_key(|e| e.days_left);
        Ok(expiring)
    }

    pub fn category_breakdown(&self) -> Result<Vec<CategorySummary>, StoreError> {
        let mut by_category: HashMap<String, CategorySummary> = HashMap::new();
        for item in self.store.list_items()? {
            if item.retired {
                continue;
            }
            let summary = by_category
                .entry(item.category.clone())
                .or_insert_with(|| CategorySummary {
                    category: item.category.clone(),
                    item_count: 0,
                    total_stock: 0,
                    total_value: 0,
                });
            summary.item_count += 1;
            summary.total_stock += item.stock_quantity;
            summary.total_value += item.stock_value();
        }

        let mut summaries: Vec<CategorySummary> = by_category.into_values().collect();
        summaries.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(summaries)
    }

    /// Best-selling items since `since`, by units sold. Only sale entries
    /// count; write-offs and corrections never inflate sales figures.
    pub fn top_selling(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopSeller>, StoreError> {
        let mut totals: HashMap<ItemId, (i64, u64)> = HashMap::new();
        for entry in self.store.entries_since(since)? {
            if entry.entry_type != EntryType::Sale {
                continue;
            }
            let (units, revenue) = totals.entry(entry.item_id).or_default();
            *units += entry.units_sold();
            *revenue += entry.revenue();
        }

        let names: HashMap<ItemId, String> = self
            .store
            .list_items()?
            .into_iter()
            .map(|item| (item.id, item.name))
            .collect();

        let mut sellers: Vec<TopSeller> = totals
            .into_iter()
            .map(|(item_id, (units_sold, revenue))| TopSeller {
                item_id,
                name: names.get(&item_id).cloned().unwrap_or_default(),
                units_sold,
                revenue,
            })
            .collect();
        sellers.sort_by(|a, b| b.units_sold.cmp(&a.units_sold));
        sellers.truncate(limit);
        Ok(sellers)
    }

    /// Counter dashboard numbers. "Today" is the UTC day containing `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> Result<InventoryStats, StoreError> {
        let items = self.store.list_items()?;
        let active: Vec<&InventoryItem> = items.iter().filter(|i| !i.retired).collect();

        let midnight = now.date_naive().and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let today_entries = match midnight {
            Some(midnight) => self.store.entries_since(midnight)?,
            None => Vec::new(),
        };
        let sales_today: Vec<_> = today_entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Sale)
            .collect();

        Ok(InventoryStats {
            total_items: active.len(),
            total_value: active.iter().map(|i| i.stock_value()).sum(),
            low_stock_count: active.iter().filter(|i| i.is_low_stock()).count(),
            promo_items_count: active.iter().filter(|i| i.is_promo_active).count(),
            revenue_today: sales_today.iter().map(|e| e.revenue()).sum(),
            transactions_today: sales_today.len(),
        })
    }
}
