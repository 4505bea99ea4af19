//! Catalog CRUD and ledger history.
//!
//! Write operations require the `manage_catalog` capability. Stock is never
//! edited here; it only moves through the settlement routes.

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use arcadia_catalog::{ItemDraft, ItemPatch};
use arcadia_infra::EntryFilter;
use arcadia_settlement::{Capability, Requester};

use crate::app::errors::{forbidden, settlement_error_to_response, store_error_to_response};
use crate::app::routes::parse_item_id;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/:id/retire", post(retire_item))
        .route("/items/:id/ledger", get(item_ledger))
}

async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Json(draft): Json<ItemDraft>,
) -> Response {
    if !requester.has(Capability::ManageCatalog) {
        return forbidden(Capability::ManageCatalog);
    }
    match services.create_item(draft).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(err) => settlement_error_to_response(err),
    }
}

async fn list_items(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.list_items().await {
        Ok(items) => Json(items).into_response(),
        Err(err) => store_error_to_response(err),
    }
}

async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw): Path<String>,
) -> Response {
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match services.get_item(item_id).await {
        Ok(versioned) => Json(versioned.item).into_response(),
        Err(err) => store_error_to_response(err),
    }
}

async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Path(raw): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> Response {
    if !requester.has(Capability::ManageCatalog) {
        return forbidden(Capability::ManageCatalog);
    }
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match services.update_item(item_id, patch).await {
        Ok(item) => Json(item).into_response(),
        Err(err) => settlement_error_to_response(err),
    }
}

async fn retire_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Path(raw): Path<String>,
) -> Response {
    if !requester.has(Capability::ManageCatalog) {
        return forbidden(Capability::ManageCatalog);
    }
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match services.retire_item(item_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_to_response(err),
    }
}

async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Path(raw): Path<String>,
) -> Response {
    if !requester.has(Capability::ManageCatalog) {
        return forbidden(Capability::ManageCatalog);
    }
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match services.delete_item(item_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct LedgerQuery {
    #[serde(default)]
    before_seq: Option<u64>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Newest-first ledger page for one item. `next_cursor` is the `seq` of the
/// last entry returned; pass it back as `before_seq` for the next page.
async fn item_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw): Path<String>,
    Query(query): Query<LedgerQuery>,
) -> Response {
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let filter = EntryFilter {
        before_seq: query.before_seq,
        limit: query.limit,
        ..EntryFilter::for_item(item_id)
    };
    match services.list_entries(filter).await {
        Ok(entries) => {
            let next_cursor = entries.last().map(|e| e.seq);
            Json(json!({ "entries": entries, "next_cursor": next_cursor })).into_response()
        }
        Err(err) => store_error_to_response(err),
    }
}
