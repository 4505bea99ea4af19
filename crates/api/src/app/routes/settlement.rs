//! Stock movement routes. Every hit here goes through the settlement
//! coordinator; nothing writes stock directly.

use std::sync::Arc;

use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};

use arcadia_settlement::{Capability, Requester, SaleRequest};

use crate::app::dto::{AdjustBody, RestockBody, receipt_json};
use crate::app::errors::{forbidden, settlement_error_to_response};
use crate::app::routes::parse_item_id;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/sales", post(create_sale))
        .route("/items/:id/restock", post(restock_item))
        .route("/items/:id/adjust", post(adjust_stock))
}

async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Json(request): Json<SaleRequest>,
) -> Response {
    if !requester.has(Capability::SellItems) {
        return forbidden(Capability::SellItems);
    }
    match services.sell(requester, request).await {
        Ok(receipt) => Json(receipt_json(&receipt)).into_response(),
        Err(err) => settlement_error_to_response(err),
    }
}

async fn restock_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Path(raw): Path<String>,
    Json(body): Json<RestockBody>,
) -> Response {
    if !requester.has(Capability::RestockItems) {
        return forbidden(Capability::RestockItems);
    }
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match services.restock(requester, body.into_request(item_id)).await {
        Ok(receipt) => Json(receipt_json(&receipt)).into_response(),
        Err(err) => settlement_error_to_response(err),
    }
}

async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<Requester>,
    Path(raw): Path<String>,
    Json(body): Json<AdjustBody>,
) -> Response {
    if !requester.has(Capability::AdjustStock) {
        return forbidden(Capability::AdjustStock);
    }
    let item_id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match services.adjust(requester, body.into_request(item_id)).await {
        Ok(receipt) => Json(receipt_json(&receipt)).into_response(),
        Err(err) => settlement_error_to_response(err),
    }
}
