//! Read-side reports. Pure folds over the catalog and the ledger; any
//! authenticated requester may read them.

use std::sync::Arc;

use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::app::errors::store_error_to_response;
use crate::app::services::AppServices;

const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 7;
const DEFAULT_TOP_SELLING_DAYS: i64 = 30;
const DEFAULT_TOP_SELLING_LIMIT: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/reports/low-stock", get(low_stock))
        .route("/reports/expiring", get(expiring))
        .route("/reports/categories", get(categories))
        .route("/reports/top-selling", get(top_selling))
        .route("/reports/stats", get(stats))
}

#[derive(Debug, Deserialize)]
struct LowStockQuery {
    #[serde(default)]
    threshold: Option<i64>,
}

async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<LowStockQuery>,
) -> Response {
    match services.low_stock(query.threshold).await {
        Ok(items) => Json(items).into_response(),
        Err(err) => store_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ExpiringQuery {
    #[serde(default)]
    within_days: Option<i64>,
}

async fn expiring(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ExpiringQuery>,
) -> Response {
    let within_days = query.within_days.unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
    match services
        .expiring(within_days, Utc::now().date_naive())
        .await
    {
        Ok(items) => Json(items).into_response(),
        Err(err) => store_error_to_response(err),
    }
}

async fn categories(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.category_breakdown().await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(err) => store_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct TopSellingQuery {
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn top_selling(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<TopSellingQuery>,
) -> Response {
    let days = query.days.unwrap_or(DEFAULT_TOP_SELLING_DAYS);
    let limit = query.limit.unwrap_or(DEFAULT_TOP_SELLING_LIMIT);
    let since = Utc::now() - Duration::days(days);
    match services.top_selling(since, limit).await {
        Ok(sellers) => Json(sellers).into_response(),
        Err(err) => store_error_to_response(err),
    }
}

async fn stats(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.stats(Utc::now()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => store_error_to_response(err),
    }
}
