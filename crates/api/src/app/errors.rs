use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use arcadia_core::DomainError;
use arcadia_infra::{SettlementError, StoreError};
use arcadia_settlement::Capability;

pub fn forbidden(capability: Capability) -> axum::response::Response {
    json_error(
        StatusCode::FORBIDDEN,
        "forbidden",
        format!("requires the {} capability", capability.as_str()),
    )
}

pub fn settlement_error_to_response(err: SettlementError) -> axum::response::Response {
    match err {
        SettlementError::Domain(e) => domain_error_to_response(e),
        SettlementError::StoreUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
        SettlementError::CompensationFailed(msg) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "compensation_failed",
            msg,
        ),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock { .. } | DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::NotEligible(_) | DomainError::NotRedeemable => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    json_error(status, err.kind(), err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
