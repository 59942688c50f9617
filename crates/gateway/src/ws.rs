//! Connection Hub (§4.1): WebSocket upgrade, the `connect` handshake, and
//! the per-connection message loop dispatching every other client frame.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use tracing::{debug, info, warn};
use wingman_protocol::{
    ClientFrame, ErrorPayload, ServerFrame, error_codes,
};

use crate::{nodes::NodeSession, scheduler::AgentRequest, state::GatewayState};

const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
pub(crate) const TAILSCALE_IDENTITY_HEADER: &str = "Tailscale-User-Login";

pub async fn ws_handler(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let tailscale_identity = headers
        .get(TAILSCALE_IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| handle_connection(socket, state, remote_addr, tailscale_identity))
}

async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
    tailscale_identity: Option<String>,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(%conn_id, remote_ip = %remote_addr.ip(), "ws: new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut outbound = state.connections.register(conn_id.clone());

    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    let handshake = tokio::time::timeout(
        Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
        wait_for_connect(&mut ws_rx),
    )
    .await;

    let (request_id, auth) = match handshake {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            warn!(%conn_id, %err, "ws: handshake failed");
            state.connections.remove(&conn_id);
            write_handle.abort();
            return;
        },
        Err(_) => {
            warn!(%conn_id, "ws: handshake timeout");
            state.connections.remove(&conn_id);
            write_handle.abort();
            return;
        },
    };

    let authorized = state.connect_auth.authorize_connect(
        remote_addr.ip(),
        auth.as_ref().and_then(|a| a.token.as_deref()),
        auth.as_ref().and_then(|a| a.password.as_deref()),
        tailscale_identity.as_deref(),
    );

    if let Err(err) = authorized {
        warn!(%conn_id, %err, "ws: connect rejected");
        send_to(&state, &conn_id, &ServerFrame::err(request_id, ErrorPayload::new(
            error_codes::UNAUTHORIZED,
            err.to_string(),
        )));
        state.connections.remove(&conn_id);
        write_handle.abort();
        return;
    }

    send_to(
        &state,
        &conn_id,
        &ServerFrame::ok(request_id, serde_json::json!({ "clientId": conn_id })),
    );
    info!(%conn_id, "ws: handshake complete");

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                debug!(%conn_id, %err, "ws: read error");
                break;
            },
        };

        if text.len() > state.config.gateway.max_frame_bytes {
            warn!(%conn_id, size = text.len(), "ws: frame too large, closing connection");
            send_to(&state, &conn_id, &ServerFrame::error(error_codes::FRAME_TOO_LARGE, "frame exceeds maxFrameBytes"));
            break;
        }

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(err) => {
                warn!(%conn_id, %err, "ws: invalid frame");
                send_to(&state, &conn_id, &ServerFrame::error(error_codes::INVALID, "malformed frame"));
                continue;
            },
        };

        dispatch(&state, &conn_id, frame).await;
    }

    state.close_connection(&conn_id).await;
    info!(%conn_id, "ws: connection closed");
    write_handle.abort();
}

async fn wait_for_connect(
    rx: &mut SplitStream<WebSocket>,
) -> anyhow::Result<(String, Option<wingman_protocol::AuthPayload>)> {
    while let Some(msg) = rx.next().await {
        let text = match msg? {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => anyhow::bail!("connection closed before handshake"),
            _ => continue,
        };

        let frame: ClientFrame = serde_json::from_str(&text)?;
        match frame {
            ClientFrame::Connect { id, auth, .. } => return Ok((id, auth)),
            other => anyhow::bail!("first frame must be 'connect', got '{}'", other.id()),
        }
    }
    anyhow::bail!("connection closed before handshake")
}

pub(crate) fn send_to(state: &GatewayState, conn_id: &str, frame: &ServerFrame) {
    let Some(conn) = state.connections.get(conn_id) else {
        return;
    };
    let json = serde_json::to_string(frame).unwrap_or_default();
    if !conn.try_send(json) {
        warn!(conn_id, "ws: outbound mailbox full, dropping frame");
    }
}

fn send_to_node(state: &GatewayState, node_id: &str, frame: &ServerFrame) -> bool {
    let Some(node) = state.nodes.get(node_id) else {
        return false;
    };
    let Some(conn) = state.connections.get(&node.conn_id) else {
        return false;
    };
    let json = serde_json::to_string(frame).unwrap_or_default();
    conn.try_send(json)
}

pub(crate) async fn dispatch(state: &Arc<GatewayState>, conn_id: &str, frame: ClientFrame) {
    let id = frame.id().to_string();
    match frame {
        ClientFrame::Connect { .. } => {
            send_to(
                state,
                conn_id,
                &ServerFrame::err(id, ErrorPayload::new(error_codes::CONFLICT, "already connected")),
            );
        },

        ClientFrame::Register { id, name, capabilities } => {
            let node = NodeSession {
                node_id: crate::nodes::generate_node_id(),
                conn_id: conn_id.to_string(),
                display_name: name,
                capabilities,
                remote_ip: None,
                connected_at: std::time::Instant::now(),
                last_heartbeat: std::time::Instant::now(),
            };
            let node_id = node.node_id.clone();
            match state.nodes.register(node) {
                Ok(()) => {
                    state.connections.set_node_id(conn_id, node_id.clone());
                    send_to(state, conn_id, &ServerFrame::Registered { node_id });
                },
                Err(err) => {
                    send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(err.code(), err.to_string())));
                },
            }
        },

        ClientFrame::Unregister { id } => {
            if let Some(node) = state.nodes.unregister_by_conn(conn_id) {
                state.groups.leave_all(&node.node_id).await;
            }
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
        },

        ClientFrame::JoinGroup { id, group_name, strategy } => {
            let Some(node_id) = current_node_id(state, conn_id) else {
                send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::NOT_CONNECTED, "register before joining a group")));
                return;
            };
            state.groups.join(&group_name, &node_id, strategy.unwrap_or_default()).await;
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
        },

        ClientFrame::LeaveGroup { id, group_id } => {
            let Some(node_id) = current_node_id(state, conn_id) else {
                send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
                return;
            };
            state.groups.leave(&group_id, &node_id).await;
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
        },

        ClientFrame::Broadcast { id, group_id, payload } => {
            let Some(node_id) = current_node_id(state, conn_id) else {
                send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::NOT_CONNECTED, "register before broadcasting")));
                return;
            };
            let state_for_send = Arc::clone(state);
            let sender_node_id = node_id.clone();
            let broadcast_group_id = group_id.clone();
            let delivered = state
                .groups
                .broadcast(&group_id, &node_id, move |target_node_id| {
                    let state_for_send = Arc::clone(&state_for_send);
                    let sender_node_id = sender_node_id.clone();
                    let group_id = broadcast_group_id.clone();
                    let payload = payload.clone();
                    async move {
                        let frame = ServerFrame::Broadcast {
                            group_id,
                            sender_node_id,
                            payload,
                        };
                        if send_to_node(&state_for_send, &target_node_id, &frame) {
                            Ok(())
                        } else {
                            Err(crate::error::GatewayError::not_found("target node not connected"))
                        }
                    }
                })
                .await
                .unwrap_or(0);
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({ "delivered": delivered })));
        },

        ClientFrame::Direct { id, target_node_id, payload } => {
            let Some(from_node_id) = current_node_id(state, conn_id) else {
                send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::NOT_CONNECTED, "register before sending a direct message")));
                return;
            };
            let frame = ServerFrame::Direct { from_node_id, payload };
            if send_to_node(state, &target_node_id, &frame) {
                send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
            } else {
                send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::NOT_FOUND, "target node not connected")));
            }
        },

        ClientFrame::Ping { id: _, timestamp } => {
            if let Some(node_id) = current_node_id(state, conn_id) {
                state.nodes.touch_heartbeat(&node_id);
            }
            send_to(state, conn_id, &ServerFrame::Pong { timestamp });
        },

        ClientFrame::RequestAgent { id, payload } => {
            handle_request_agent(state, conn_id, id, payload).await;
        },

        ClientFrame::CancelRequest { id, request_id } => {
            state.scheduler.cancel(&request_id);
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
        },

        ClientFrame::SessionSubscribe { id, session_id } => {
            state.subscriptions.subscribe(&session_id, conn_id);
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
        },

        ClientFrame::SessionUnsubscribe { id, session_id } => {
            state.subscriptions.unsubscribe(&session_id, conn_id);
            send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({})));
        },
    }
}

fn current_node_id(state: &GatewayState, conn_id: &str) -> Option<String> {
    state.connections.get(conn_id).and_then(|c| c.node_id)
}

async fn handle_request_agent(
    state: &Arc<GatewayState>,
    conn_id: &str,
    id: String,
    payload: wingman_protocol::RequestAgentPayload,
) {
    if let Some(node_id) = current_node_id(state, conn_id)
        && state.nodes.is_rate_limited(&node_id)
    {
        send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::RATE_LIMITED, "message rate limit exceeded")));
        return;
    }
    if let Some(node_id) = current_node_id(state, conn_id) {
        state.nodes.record_message(&node_id);
    }

    let agents = state.agents.read().await;
    let route = match wingman_routing::resolve_agent_route(
        payload.agent_id.as_deref(),
        payload.session_key.as_deref(),
        payload.routing.as_ref(),
        &agents.bindings,
        state.config.default_agent.as_deref(),
        &agents.agent_ids(),
    ) {
        Ok(route) => route,
        Err(err) => {
            send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::INVALID, err.to_string())));
            return;
        },
    };
    drop(agents);

    let session = match state.sessions.create_session(&route.agent_id, &route.session_key, None).await {
        Ok(session) => session,
        Err(err) => {
            send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::INTERNAL, err.to_string())));
            return;
        },
    };

    if let Some(content) = payload.content.clone() {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let message = wingman_sessions::PersistedMessage::user(session.id.clone(), content, now_ms);
        if let Err(err) = state.sessions.append_message(&session, &route.session_key, message).await {
            send_to(state, conn_id, &ServerFrame::err(id, ErrorPayload::new(error_codes::INTERNAL, err.to_string())));
            return;
        }
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    send_to(state, conn_id, &ServerFrame::ok(id, serde_json::json!({ "requestId": request_id })));

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    state.scheduler.submit(
        AgentRequest {
            request_id: request_id.clone(),
            agent_id: route.agent_id,
            session_key: route.session_key,
            session_id: session.id.clone(),
            content: payload.content,
            queue_if_busy: payload.queue_if_busy.unwrap_or(true),
        },
        events_tx,
    );
    state.track_request(conn_id, &request_id);

    let state = Arc::clone(state);
    let conn_id = conn_id.to_string();
    let session_id = session.id;
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let terminal = event.is_terminal();
            let frame = ServerFrame::AgentEvent {
                request_id: request_id.clone(),
                session_id: Some(session_id.clone()),
                payload: event,
                seq: state.next_seq(),
            };
            send_to(&state, &conn_id, &frame);
            for subscriber in state.subscriptions.subscribers(&session_id) {
                if subscriber != conn_id {
                    send_to(&state, &subscriber, &frame);
                }
            }
            if terminal {
                state.record_message_processed();
                state.untrack_request(&conn_id, &request_id);
                break;
            }
        }
    });
}
