//! Postgres-backed inventory store.
//!
//! Catalog rows carry a `version` column; `commit_mutation` performs a
//! conditional `UPDATE ... WHERE version = $expected` and appends the ledger
//! entry in the same transaction. A lost race surfaces as zero updated rows
//! (or a unique violation on `(item_id, item_version)`), both mapped to
//! `StoreError::Conflict` so the engine can retry.
//!
//! The `InventoryStore` trait is synchronous; sqlx operations are async. The
//! trait impl bridges with `tokio::runtime::Handle::block_on`, which panics
//! if called on a runtime worker thread. Async callers must reach the trait
//! from the blocking pool (`tokio::task::spawn_blocking`), as the API
//! service layer does.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use arcadia_catalog::InventoryItem;
use arcadia_core::{EntryId, ItemId};
use arcadia_ledger::{EntryMeta, EntryType, LedgerEntry, NewLedgerEntry};

use super::r#trait::{
    CommittedMutation, EntryFilter, InventoryStore, RestockPatch, StoreError, VersionedItem,
};

/// Create the inventory tables if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            item_id UUID PRIMARY KEY,
            version BIGINT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            unit_price BIGINT NOT NULL,
            cost_price BIGINT,
            stock_quantity BIGINT NOT NULL CHECK (stock_quantity >= 0),
            low_stock_threshold BIGINT NOT NULL,
            is_redeemable BOOLEAN NOT NULL,
            points_required BIGINT NOT NULL,
            is_vip_only BOOLEAN NOT NULL,
            is_promo_active BOOLEAN NOT NULL,
            expiry_date DATE,
            supplier TEXT,
            retired BOOLEAN NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("ensure_schema", e))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_entries (
            entry_id UUID PRIMARY KEY,
            seq BIGSERIAL UNIQUE,
            item_id UUID NOT NULL REFERENCES items (item_id),
            item_version BIGINT NOT NULL,
            delta BIGINT NOT NULL CHECK (delta <> 0),
            entry_type TEXT NOT NULL,
            meta JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (item_id, item_version)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("ensure_schema", e))?;

    Ok(())
}

/// Postgres implementation of [`InventoryStore`].
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    pub async fn insert_item_async(&self, item: InventoryItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (
                item_id, version, name, category, unit_price, cost_price,
                stock_quantity, low_stock_threshold, is_redeemable,
                points_required, is_vip_only, is_promo_active, expiry_date,
                supplier, retired, created_at, updated_at
            )
            VALUES ($1, 1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price as i64)
        .bind(item.cost_price.map(|p| p as i64))
        .bind(item.stock_quantity)
        .bind(item.low_stock_threshold)
        .bind(item.is_redeemable)
        .bind(item.points_required)
        .bind(item.is_vip_only)
        .bind(item.is_promo_active)
        .bind(item.expiry_date)
        .bind(&item.supplier)
        .bind(item.retired)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        Ok(())
    }

    pub async fn get_item_async(&self, item_id: ItemId) -> Result<VersionedItem, StoreError> {
        let row = sqlx::query(ITEM_SELECT_BY_ID)
            .bind(item_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;

        row.as_ref()
            .map(versioned_item_from_row)
            .transpose()?
            .ok_or(StoreError::NotFound)
    }

    pub async fn list_items_async(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let sql = format!("{ITEM_SELECT} ORDER BY name ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter()
            .map(|row| versioned_item_from_row(row).map(|v| v.item))
            .collect()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, expected_version), err)]
    pub async fn update_item_async(
        &self,
        item: InventoryItem,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE items SET
                version = version + 1,
                name = $2, category = $3, unit_price = $4, cost_price = $5,
                low_stock_threshold = $6, is_redeemable = $7,
                points_required = $8, is_vip_only = $9, is_promo_active = $10,
                expiry_date = $11, supplier = $12, retired = $13,
                updated_at = $14
            WHERE item_id = $1 AND version = $15
            RETURNING version
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price as i64)
        .bind(item.cost_price.map(|p| p as i64))
        .bind(item.low_stock_threshold)
        .bind(item.is_redeemable)
        .bind(item.points_required)
        .bind(item.is_vip_only)
        .bind(item.is_promo_active)
        .bind(item.expiry_date)
        .bind(&item.supplier)
        .bind(item.retired)
        .bind(item.updated_at)
        .bind(expected_version as i64)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        match row {
            Some(row) => {
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| StoreError::Unavailable(format!("failed to read version: {e}")))?;
                Ok(version as u64)
            }
            None => {
                // Distinguish a missing row from a lost race.
                self.get_item_async(item.id).await?;
                Err(StoreError::Conflict(format!(
                    "expected version {expected_version} has moved"
                )))
            }
        }
    }

    pub async fn retire_item_async(&self, item_id: ItemId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE items SET retired = TRUE, version = version + 1, updated_at = NOW() WHERE item_id = $1",
        )
        .bind(item_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("retire_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_item_async(&self, item_id: ItemId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM ledger_entries WHERE item_id = $1) AS has_history",
        )
        .bind(item_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_item", e))?;

        let has_history: bool = row
            .try_get("has_history")
            .map_err(|e| StoreError::Unavailable(format!("failed to read has_history: {e}")))?;
        if has_history {
            return Err(StoreError::Conflict(
                "item has ledger history; retire it instead".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM items WHERE item_id = $1")
            .bind(item_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, entry, patch),
        fields(item_id = %entry.item_id, delta = entry.delta, expected_version),
        err
    )]
    pub async fn commit_mutation_async(
        &self,
        expected_version: u64,
        entry: NewLedgerEntry,
        patch: Option<RestockPatch>,
    ) -> Result<CommittedMutation, StoreError> {
        let patch = patch.unwrap_or_default();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            UPDATE items SET
                stock_quantity = stock_quantity + $2,
                version = version + 1,
                cost_price = COALESCE($3, cost_price),
                supplier = COALESCE($4, supplier),
                updated_at = NOW()
            WHERE item_id = $1 AND version = $5
            RETURNING stock_quantity, version
            "#,
        )
        .bind(entry.item_id.as_uuid())
        .bind(entry.delta)
        .bind(patch.cost_price.map(|p| p as i64))
        .bind(&patch.supplier)
        .bind(expected_version as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_mutation", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            self.get_item_async(entry.item_id).await?;
            return Err(StoreError::Conflict(format!(
                "expected version {expected_version} has moved"
            )));
        };

        let new_stock: i64 = row
            .try_get("stock_quantity")
            .map_err(|e| StoreError::Unavailable(format!("failed to read stock_quantity: {e}")))?;
        let new_version: i64 = row
            .try_get("version")
            .map_err(|e| StoreError::Unavailable(format!("failed to read version: {e}")))?;

        let entry_id = EntryId::new();
        let meta = serde_json::to_value(&entry.meta)
            .map_err(|e| StoreError::Unavailable(format!("meta serialization failed: {e}")))?;

        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (entry_id, item_id, item_version, delta, entry_type, meta)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING seq, created_at
            "#,
        )
        .bind(entry_id.as_uuid())
        .bind(entry.item_id.as_uuid())
        .bind(new_version)
        .bind(entry.delta)
        .bind(entry.entry_type.as_str())
        .bind(&meta)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_entry", e))?;

        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| StoreError::Unavailable(format!("failed to read seq: {e}")))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| StoreError::Unavailable(format!("failed to read created_at: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(CommittedMutation {
            entry: LedgerEntry {
                id: entry_id,
                seq: seq as u64,
                item_id: entry.item_id,
                delta: entry.delta,
                entry_type: entry.entry_type,
                meta: entry.meta,
                created_at,
            },
            new_stock,
            new_version: new_version as u64,
        })
    }

    pub async fn list_entries_async(
        &self,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let item_param: Option<uuid::Uuid> = filter.item_id.map(|id| *id.as_uuid());
        let cursor_param: Option<i64> = filter.before_seq.map(|s| s as i64);

        let rows = sqlx::query(
            r#"
            SELECT entry_id, seq, item_id, delta, entry_type, meta, created_at
            FROM ledger_entries
            WHERE ($1::uuid IS NULL OR item_id = $1)
                AND ($2::bigint IS NULL OR seq < $2)
            ORDER BY seq DESC
            LIMIT $3
            "#,
        )
        .bind(item_param)
        .bind(cursor_param)
        .bind(filter.effective_limit() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    pub async fn entries_since_async(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, seq, item_id, delta, entry_type, meta, created_at
            FROM ledger_entries
            WHERE created_at >= $1
            ORDER BY seq ASC
            "#,
        )
        .bind(since)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_since", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    pub async fn ledger_stock_async(&self, item_id: ItemId) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(delta), 0) AS total FROM ledger_entries WHERE item_id = $1",
        )
        .bind(item_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_stock", e))?;

        row.try_get::<i64, _>("total")
            .map_err(|e| StoreError::Unavailable(format!("failed to read total: {e}")))
    }
}

const ITEM_SELECT: &str = r#"
    SELECT item_id, version, name, category, unit_price, cost_price,
           stock_quantity, low_stock_threshold, is_redeemable, points_required,
           is_vip_only, is_promo_active, expiry_date, supplier, retired,
           created_at, updated_at
    FROM items
"#;

const ITEM_SELECT_BY_ID: &str = r#"
    SELECT item_id, version, name, category, unit_price, cost_price,
           stock_quantity, low_stock_threshold, is_redeemable, points_required,
           is_vip_only, is_promo_active, expiry_date, supplier, retired,
           created_at, updated_at
    FROM items
    WHERE item_id = $1
"#;

fn column_error(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("failed to decode row: {err}"))
}

fn versioned_item_from_row(row: &sqlx::postgres::PgRow) -> Result<VersionedItem, StoreError> {
    let unit_price: i64 = row.try_get("unit_price").map_err(column_error)?;
    let cost_price: Option<i64> = row.try_get("cost_price").map_err(column_error)?;
    let expiry_date: Option<NaiveDate> = row.try_get("expiry_date").map_err(column_error)?;
    let item_id: uuid::Uuid = row.try_get("item_id").map_err(column_error)?;
    let version: i64 = row.try_get("version").map_err(column_error)?;

    Ok(VersionedItem {
        item: InventoryItem {
            id: ItemId::from_uuid(item_id),
            name: row.try_get("name").map_err(column_error)?,
            category: row.try_get("category").map_err(column_error)?,
            unit_price: unit_price as u64,
            cost_price: cost_price.map(|p| p as u64),
            stock_quantity: row.try_get("stock_quantity").map_err(column_error)?,
            low_stock_threshold: row.try_get("low_stock_threshold").map_err(column_error)?,
            is_redeemable: row.try_get("is_redeemable").map_err(column_error)?,
            points_required: row.try_get("points_required").map_err(column_error)?,
            is_vip_only: row.try_get("is_vip_only").map_err(column_error)?,
            is_promo_active: row.try_get("is_promo_active").map_err(column_error)?,
            expiry_date,
            supplier: row.try_get("supplier").map_err(column_error)?,
            retired: row.try_get("retired").map_err(column_error)?,
            created_at: row.try_get("created_at").map_err(column_error)?,
            updated_at: row.try_get("updated_at").map_err(column_error)?,
        },
        version: version as u64,
    })
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
    let entry_id: uuid::Uuid = row.try_get("entry_id").map_err(column_error)?;
    let seq: i64 = row.try_get("seq").map_err(column_error)?;
    let item_id: uuid::Uuid = row.try_get("item_id").map_err(column_error)?;
    let entry_type: String = row.try_get("entry_type").map_err(column_error)?;
    let meta: serde_json::Value = row.try_get("meta").map_err(column_error)?;

    let entry_type = parse_entry_type(&entry_type)?;
    let meta: EntryMeta = serde_json::from_value(meta)
        .map_err(|e| StoreError::Unavailable(format!("meta deserialization failed: {e}")))?;

    Ok(LedgerEntry {
        id: EntryId::from_uuid(entry_id),
        seq: seq as u64,
        item_id: ItemId::from_uuid(item_id),
        delta: row.try_get("delta").map_err(column_error)?,
        entry_type,
        meta,
        created_at: row.try_get("created_at").map_err(column_error)?,
    })
}

fn parse_entry_type(raw: &str) -> Result<EntryType, StoreError> {
    match raw {
        "sale" => Ok(EntryType::Sale),
        "restock" => Ok(EntryType::Restock),
        "adjustment" => Ok(EntryType::Adjustment),
        "expired" => Ok(EntryType::Expired),
        other => Err(StoreError::Unavailable(format!(
            "unknown entry_type in row: {other}"
        ))),
    }
}

/// Map sqlx errors to `StoreError`. Unique violations (PG code 23505) mean a
/// concurrent commit won the race and are retryable.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

fn runtime_handle() -> Result<tokio::runtime::Handle, StoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Unavailable(
            "PostgresInventoryStore requires a tokio runtime context".to_string(),
        )
    })
}

impl InventoryStore for PostgresInventoryStore {
    fn insert_item(&self, item: InventoryItem) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.insert_item_async(item))
    }

    fn get_item(&self, item_id: ItemId) -> Result<VersionedItem, StoreError> {
        runtime_handle()?.block_on(self.get_item_async(item_id))
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        runtime_handle()?.block_on(self.list_items_async())
    }

    fn update_item(&self, item: InventoryItem, expected_version: u64) -> Result<u64, StoreError> {
        runtime_handle()?.block_on(self.update_item_async(item, expected_version))
    }

    fn retire_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.retire_item_async(item_id))
    }

    fn delete_item(&self, item_id: ItemId) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.delete_item_async(item_id))
    }

    fn commit_mutation(
        &self,
        expected_version: u64,
        entry: NewLedgerEntry,
        patch: Option<RestockPatch>,
    ) -> Result<CommittedMutation, StoreError> {
        runtime_handle()?.block_on(self.commit_mutation_async(expected_version, entry, patch))
    }

    fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        runtime_handle()?.block_on(self.list_entries_async(filter))
    }

    fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        runtime_handle()?.block_on(self.entries_since_async(since))
    }

    fn ledger_stock(&self, item_id: ItemId) -> Result<i64, StoreError> {
        runtime_handle()?.block_on(self.ledger_stock_async(item_id))
    }
}
