//! HTTP long-poll bridge (§4.1): the WebSocket-equivalent transport for
//! clients that can't hold a socket open. `POST /bridge/send` and
//! `GET /bridge/poll` share [`crate::ws::dispatch`] with the WebSocket
//! handler — only the outbound transport differs, an in-memory per-node
//! backlog (`ConnectionRegistry::register_bridge`) instead of a live socket.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::warn;
use wingman_protocol::ClientFrame;

use crate::{
    error::GatewayError,
    state::GatewayState,
    ws::{self, TAILSCALE_IDENTITY_HEADER},
};

const NODE_ID_HEADER: &str = "X-Node-ID";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 25_000;
const MAX_POLL_TIMEOUT_MS: u64 = 60_000;

pub async fn bridge_send(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if body.len() > state.config.gateway.max_frame_bytes {
        return (StatusCode::PAYLOAD_TOO_LARGE, Json(serde_json::json!({
            "error": { "code": "FrameTooLarge", "message": "frame exceeds maxFrameBytes" }
        }))).into_response();
    }

    let frame: ClientFrame = match serde_json::from_str(&body) {
        Ok(frame) => frame,
        Err(err) => {
            return GatewayError::invalid(format!("malformed frame: {err}")).into_response();
        },
    };

    let existing_conn_id = headers.get(NODE_ID_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);

    match existing_conn_id {
        Some(conn_id) => {
            if state.connections.get(&conn_id).is_none() {
                return GatewayError::unauthorized("unknown or expired bridge connection").into_response();
            }
            ws::dispatch(&state, &conn_id, frame).await;
            StatusCode::ACCEPTED.into_response()
        },
        None => connect_bridge(&state, remote_addr, &headers, frame).await,
    }
}

async fn connect_bridge(
    state: &Arc<GatewayState>,
    remote_addr: SocketAddr,
    headers: &HeaderMap,
    frame: ClientFrame,
) -> axum::response::Response {
    let ClientFrame::Connect { auth, .. } = frame else {
        return GatewayError::invalid("first bridge frame must be 'connect'").into_response();
    };

    let tailscale_identity = headers.get(TAILSCALE_IDENTITY_HEADER).and_then(|v| v.to_str().ok());
    let authorized = state.connect_auth.authorize_connect(
        remote_addr.ip(),
        auth.as_ref().and_then(|a| a.token.as_deref()),
        auth.as_ref().and_then(|a| a.password.as_deref()),
        tailscale_identity,
    );

    if let Err(err) = authorized {
        warn!(%remote_addr, %err, "bridge: connect rejected");
        return GatewayError::unauthorized(err.to_string()).into_response();
    }

    let conn_id = uuid::Uuid::new_v4().to_string();
    state.connections.register_bridge(conn_id.clone());
    Json(serde_json::json!({ "clientId": conn_id })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PollParams {
    #[serde(rename = "pollTimeoutMs")]
    poll_timeout_ms: Option<u64>,
}

pub async fn bridge_poll(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(params): Query<PollParams>,
) -> impl IntoResponse {
    let Some(conn_id) = headers.get(NODE_ID_HEADER).and_then(|v| v.to_str().ok()) else {
        return GatewayError::invalid("missing X-Node-ID header").into_response();
    };

    let timeout_ms = params
        .poll_timeout_ms
        .unwrap_or(DEFAULT_POLL_TIMEOUT_MS)
        .min(MAX_POLL_TIMEOUT_MS);

    match state.connections.poll_bridge(conn_id, Duration::from_millis(timeout_ms)).await {
        Some(frames) => {
            let parsed: Vec<serde_json::Value> = frames
                .iter()
                .filter_map(|f| serde_json::from_str(f).ok())
                .collect();
            Json(serde_json::json!({ "frames": parsed })).into_response()
        },
        None => GatewayError::not_found("unknown bridge connection").into_response(),
    }
}
