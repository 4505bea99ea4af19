//! Requester context extraction.
//!
//! Authentication terminates upstream; the gateway forwards the verified
//! actor and its capabilities in `x-actor` / `x-capabilities` headers. This
//! middleware turns them into a [`Requester`] extension for handlers.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use arcadia_core::ActorId;
use arcadia_settlement::{Capability, Requester};

use crate::app::errors::json_error;

pub async fn requester_middleware(mut req: Request, next: Next) -> Response {
    let requester = match requester_from_headers(req.headers()) {
        Ok(requester) => requester,
        Err(response) => return response,
    };
    req.extensions_mut().insert(requester);
    next.run(req).await
}

fn requester_from_headers(headers: &axum::http::HeaderMap) -> Result<Requester, Response> {
    let actor = headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing x-actor header",
            )
        })?;
    let actor_id: ActorId = actor.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            "x-actor must be a uuid",
        )
    })?;

    let raw = headers
        .get("x-capabilities")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mut capabilities = Vec::new();
    for token in raw.split(',').filter(|t| !t.trim().is_empty()) {
        let capability: Capability = token.parse().map_err(|e| {
            json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("{e}"),
            )
        })?;
        capabilities.push(capability);
    }

    Ok(Requester::new(actor_id, capabilities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn headers_parse_into_a_requester() {
        let mut headers = HeaderMap::new();
        headers.insert("x-actor", uuid::Uuid::now_v7().to_string().parse().unwrap());
        headers.insert("x-capabilities", "sell_items, restock_items".parse().unwrap());

        let requester = requester_from_headers(&headers).unwrap();
        assert!(requester.has(Capability::SellItems));
        assert!(requester.has(Capability::RestockItems));
        assert!(!requester.has(Capability::ManageCatalog));
    }

    #[test]
    fn missing_actor_header_is_rejected() {
        let headers = HeaderMap::new();
        assert!(requester_from_headers(&headers).is_err());
    }

    #[test]
    fn unknown_capability_token_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-actor", uuid::Uuid::now_v7().to_string().parse().unwrap());
        headers.insert("x-capabilities", "sell_items,root".parse().unwrap());
        assert!(requester_from_headers(&headers).is_err());
    }
}
