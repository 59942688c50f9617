//! `/api/sessions*` (§4.7, §6): CRUD over the Session Persistence layer.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{error::GatewayError, state::GatewayState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

pub async fn list_sessions(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    match state.sessions.list_sessions(query.agent_id.as_deref()).await {
        Ok(sessions) => Json(serde_json::json!({ "sessions": sessions })).into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[serde(rename = "agentId")]
    agent_id: String,
    key: String,
    name: Option<String>,
}

pub async fn create_session(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<CreateSessionBody>,
) -> impl IntoResponse {
    match state
        .sessions
        .create_session(&body.agent_id, &body.key, body.name.as_deref())
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}

pub async fn get_session(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get_session_by_id(&id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => GatewayError::not_found("no such session").into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}

pub async fn delete_session(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let session = match state.sessions.get_session_by_id(&id).await {
        Ok(Some(session)) => session,
        Ok(None) => return GatewayError::not_found("no such session").into_response(),
        Err(err) => return GatewayError::internal(err.to_string()).into_response(),
    };
    match state.sessions.delete_session(&session).await {
        Ok(_) => Json(serde_json::json!({ "deleted": true })).into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}

pub async fn get_messages(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let session = match state.sessions.get_session_by_id(&id).await {
        Ok(Some(session)) => session,
        Ok(None) => return GatewayError::not_found("no such session").into_response(),
        Err(err) => return GatewayError::internal(err.to_string()).into_response(),
    };
    match state.sessions.read_messages(&session.key).await {
        Ok(messages) => Json(serde_json::json!({ "messages": messages })).into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}

pub async fn clear_messages(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let session = match state.sessions.get_session_by_id(&id).await {
        Ok(Some(session)) => session,
        Ok(None) => return GatewayError::not_found("no such session").into_response(),
        Err(err) => return GatewayError::internal(err.to_string()).into_response(),
    };
    let key = session.key.clone();
    match state.sessions.clear_messages(&session, &key).await {
        Ok(()) => Json(serde_json::json!({ "cleared": true })).into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}
