//! Assembles the full `axum::Router`: the WebSocket upgrade, the HTTP
//! bridge, `/health`/`/stats`, and the `/api/*` surface behind the operator
//! session middleware.

use std::sync::Arc;

use axum::{Router, middleware, routing::{get, post}};
use tower_http::trace::TraceLayer;

use crate::{agents_api, auth_middleware, bridge, fs_api, health, providers_api, sessions_api, state::GatewayState, ws};

#[must_use]
pub fn build(state: Arc<GatewayState>) -> Router {
    let api = Router::new()
        .route("/sessions", get(sessions_api::list_sessions).post(sessions_api::create_session))
        .route(
            "/sessions/{id}",
            get(sessions_api::get_session).delete(sessions_api::delete_session),
        )
        .route(
            "/sessions/{id}/messages",
            get(sessions_api::get_messages).delete(sessions_api::clear_messages),
        )
        .route("/agents", get(agents_api::list_agents))
        .route(
            "/agents/{id}",
            get(agents_api::get_agent).post(agents_api::create_agent).put(agents_api::put_agent),
        )
        .route("/fs/roots", get(fs_api::list_roots))
        .route("/fs/list", get(fs_api::list_dir))
        .route("/fs/mkdir", post(fs_api::mkdir))
        .route("/fs/file", get(fs_api::read_file))
        .route("/providers", get(providers_api::list_providers))
        .route(
            "/providers/{name}",
            get(providers_api::get_provider)
                .put(providers_api::put_provider)
                .delete(providers_api::delete_provider),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware::require_operator_session,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/stats", get(health::stats))
        .route("/metrics", get(health::metrics))
        .route("/ws", get(ws::ws_handler))
        .route("/bridge/send", post(bridge::bridge_send))
        .route("/bridge/poll", get(bridge::bridge_poll))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
