//! `/health` and `/stats` (§6): plain liveness/capacity endpoints, no auth —
//! the same "skip auth for operational probes" stance the teacher's own
//! health handler takes.

use std::sync::Arc;

use axum::{Json, extract::State, http::header, response::IntoResponse};

use crate::state::GatewayState;

async fn stats_block(state: &GatewayState) -> serde_json::Value {
    serde_json::json!({
        "uptime": state.uptime().as_secs(),
        "totalNodes": state.nodes.count(),
        "totalGroups": state.groups.count().await,
        "messagesProcessed": state.messages_processed(),
        "startedAt": started_at_epoch_secs(state),
        "activeSessions": state.scheduler.active_sessions(),
    })
}

pub async fn health(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": state.version,
        "stats": stats_block(&state).await,
        "timestamp": started_at_epoch_secs(&state) + state.uptime().as_secs(),
    }))
}

pub async fn stats(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    let mut block = stats_block(&state).await;
    let nodes: Vec<serde_json::Value> = state
        .nodes
        .list()
        .into_iter()
        .map(|n| {
            serde_json::json!({
                "nodeId": n.node_id,
                "displayName": n.display_name,
                "capabilities": n.capabilities,
            })
        })
        .collect();
    if let Some(obj) = block.as_object_mut() {
        obj.insert("nodes".to_string(), serde_json::Value::Array(nodes));
    }
    Json(block)
}

/// `/metrics`: Prometheus text exposition, unauthenticated like `/health` —
/// scraped by infrastructure that has no business holding an operator
/// session.
pub async fn metrics(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], state.metrics.render())
}

fn started_at_epoch_secs(state: &GatewayState) -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.saturating_sub(state.uptime()).as_secs()
}
