//! `/api/*` auth layer (§6): an `Authorization: Bearer <token>` or
//! `X-Gateway-Token` header validated against `wingman_auth::CredentialStore`'s
//! session tokens. Distinct from the wire `connect` handshake in `ws.rs` —
//! this guards the HTTP control surface, not node connections.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use crate::state::GatewayState;

const TOKEN_HEADER: &str = "X-Gateway-Token";

fn extract_token(req: &Request<Body>) -> Option<String> {
    if let Some(value) = req.headers().get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value.to_string());
    }
    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Protects the `/api/*` surface. When the operator password has never been
/// set, requests pass through unauthenticated (first-run setup still needs
/// to reach these routes to set one).
pub async fn require_operator_session(
    State(state): State<Arc<GatewayState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.credentials.is_setup_complete() {
        return next.run(req).await;
    }

    let Some(token) = extract_token(&req) else {
        return unauthorized();
    };

    match state.credentials.validate_session(&token).await {
        Ok(true) => next.run(req).await,
        _ => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": { "code": "Unauthorized", "message": "missing or invalid gateway token" }
        })),
    )
        .into_response()
}
