//! `/api/agents*` (§6): the configured agent roster. Reads and writes go
//! through `GatewayState::agents`, the mutable overlay over the loaded
//! config's `agents.list` — roster edits take effect for routing immediately,
//! without requiring a restart.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use wingman_config::AgentEntry;

use crate::{error::GatewayError, state::GatewayState};

pub async fn list_agents(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let agents = state.agents.read().await;
    Json(serde_json::json!({ "agents": agents.list }))
}

pub async fn get_agent(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let agents = state.agents.read().await;
    match agents.list.iter().find(|a| a.id == id) {
        Some(agent) => Json(agent.clone()).into_response(),
        None => GatewayError::not_found("no such agent").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertAgentBody {
    name: Option<String>,
}

/// `POST /api/agents/{id}` — create, failing if the id is already taken.
pub async fn create_agent(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(body): Json<UpsertAgentBody>,
) -> impl IntoResponse {
    let mut agents = state.agents.write().await;
    if agents.list.iter().any(|a| a.id == id) {
        return GatewayError::conflict("agent id already exists").into_response();
    }
    let entry = AgentEntry { id, name: body.name };
    agents.list.push(entry.clone());
    Json(entry).into_response()
}

/// `PUT /api/agents/{id}` — create-or-replace.
pub async fn put_agent(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(body): Json<UpsertAgentBody>,
) -> impl IntoResponse {
    let mut agents = state.agents.write().await;
    let entry = AgentEntry { id: id.clone(), name: body.name };
    match agents.list.iter_mut().find(|a| a.id == id) {
        Some(existing) => *existing = entry.clone(),
        None => agents.list.push(entry.clone()),
    }
    Json(entry).into_response()
}
