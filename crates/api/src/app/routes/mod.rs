use axum::Router;
use axum::http::StatusCode;
use axum::response::Response;

use arcadia_core::ItemId;

use crate::app::errors::json_error;

pub mod items;
pub mod reports;
pub mod settlement;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .merge(items::router())
        .merge(settlement::router())
        .merge(reports::router())
}

pub(crate) fn parse_item_id(raw: &str) -> Result<ItemId, Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            "item id must be a uuid",
        )
    })
}
