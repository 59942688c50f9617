#![allow(clippy::unwrap_used, clippy::expect_used, unsafe_code)]
//! End-to-end coverage of the full gateway stack: a bound `TcpListener`
//! serving the real router, a `tokio-tungstenite` client for `/ws`, and
//! `reqwest` for the HTTP surfaces (`/health`, `/bridge/*`).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt, future::BoxFuture};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use wingman_gateway::{AgentRequest, AgentRunner, GatewayState, RunnerError};
use wingman_protocol::{AgentEventPayload, ClientDescriptor, ClientFrame, ServerFrame};

/// `WINGMAN_HOME` is a process-wide env var; serialize every test that spins
/// up a gateway (each calls `build_state`, which reads it) so they don't
/// stomp on each other's session/attachment directories mid-run.
static HOME_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Echoes a fixed completion back for every request, simulating an agent
/// runtime without depending on one.
struct EchoRunner;

impl AgentRunner for EchoRunner {
    fn run(
        &self,
        request: AgentRequest,
        events: mpsc::UnboundedSender<AgentEventPayload>,
        _cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<(), RunnerError>> {
        Box::pin(async move {
            let _ = events.send(AgentEventPayload::AgentStream {
                chunk: "hello".into(),
                message_id: Some(format!("{}-msg", request.request_id)),
                is_delta: true,
                event_key: None,
                stream_message_id: None,
            });
            let _ = events.send(AgentEventPayload::AgentComplete {
                message_id: format!("{}-msg", request.request_id),
            });
            Ok(())
        })
    }
}

/// Never resolves until cancelled, for testing mid-stream cancellation.
struct BlocksUntilCancelled;

impl AgentRunner for BlocksUntilCancelled {
    fn run(
        &self,
        _request: AgentRequest,
        _events: mpsc::UnboundedSender<AgentEventPayload>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<(), RunnerError>> {
        Box::pin(async move {
            cancel.cancelled().await;
            Ok(())
        })
    }
}

struct TestGateway {
    addr: SocketAddr,
    state: Arc<GatewayState>,
    _home: tempfile::TempDir,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl TestGateway {
    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn start_gateway(runner: Arc<dyn AgentRunner>) -> TestGateway {
    let lock = HOME_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let home = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("WINGMAN_HOME", home.path());
    }

    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let config = wingman_config::WingmanConfig::default();
    let state = wingman_gateway::build_state(config, pool, runner).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = wingman_gateway::router::build(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    TestGateway {
        addr,
        state,
        _home: home,
        _lock: lock,
    }
}

fn connect_frame(id: &str) -> ClientFrame {
    ClientFrame::Connect {
        id: id.into(),
        client: ClientDescriptor {
            id: "test-client".into(),
            display_name: None,
            version: "0.0.0".into(),
            platform: "test".into(),
            mode: "cli".into(),
            capabilities: None,
        },
        auth: None,
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn send_frame(ws: &mut WsStream, frame: &ClientFrame) {
    let text = serde_json::to_string(frame).unwrap();
    ws.send(WsMessage::Text(text.into())).await.unwrap();
}

async fn recv_frame(ws: &mut WsStream) -> ServerFrame {
    loop {
        match ws.next().await.unwrap().unwrap() {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn health_reports_zero_nodes_on_a_fresh_gateway() {
    let gateway = start_gateway(Arc::new(EchoRunner)).await;
    let resp = reqwest::get(gateway.http_url("/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["stats"]["totalNodes"], 0);
}

#[tokio::test]
async fn connect_then_request_agent_completes_end_to_end() {
    let gateway = start_gateway(Arc::new(EchoRunner)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(gateway.ws_url()).await.unwrap();

    send_frame(&mut ws, &connect_frame("c1")).await;
    let ack = recv_frame(&mut ws).await;
    assert!(matches!(ack, ServerFrame::Response { ok: true, .. }));

    send_frame(
        &mut ws,
        &ClientFrame::RequestAgent {
            id: "r1".into(),
            payload: wingman_protocol::RequestAgentPayload {
                agent_id: Some("assistant".into()),
                content: Some("hi".into()),
                ..Default::default()
            },
        },
    )
    .await;

    let ack = recv_frame(&mut ws).await;
    let ServerFrame::Response { ok: true, payload, .. } = ack else {
        panic!("expected ok response to req:agent");
    };
    let request_id = payload.unwrap()["requestId"].as_str().unwrap().to_string();

    let start = recv_frame(&mut ws).await;
    let ServerFrame::AgentEvent { payload: AgentEventPayload::AgentStart { .. }, request_id: rid, .. } = start else {
        panic!("expected agent-start event");
    };
    assert_eq!(rid, request_id);

    let stream = recv_frame(&mut ws).await;
    assert!(matches!(
        stream,
        ServerFrame::AgentEvent { payload: AgentEventPayload::AgentStream { .. }, .. }
    ));

    let complete = recv_frame(&mut ws).await;
    assert!(matches!(
        complete,
        ServerFrame::AgentEvent { payload: AgentEventPayload::AgentComplete { .. }, .. }
    ));
}

#[tokio::test]
async fn cancel_mid_stream_delivers_cancelled_error() {
    let gateway = start_gateway(Arc::new(BlocksUntilCancelled)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(gateway.ws_url()).await.unwrap();

    send_frame(&mut ws, &connect_frame("c1")).await;
    let _ack = recv_frame(&mut ws).await;

    send_frame(
        &mut ws,
        &ClientFrame::RequestAgent {
            id: "r1".into(),
            payload: wingman_protocol::RequestAgentPayload {
                agent_id: Some("assistant".into()),
                content: Some("hi".into()),
                ..Default::default()
            },
        },
    )
    .await;
    let ack = recv_frame(&mut ws).await;
    let ServerFrame::Response { ok: true, payload, .. } = ack else {
        panic!("expected ok response to req:agent");
    };
    let request_id = payload.unwrap()["requestId"].as_str().unwrap().to_string();

    let start = recv_frame(&mut ws).await;
    assert!(matches!(
        start,
        ServerFrame::AgentEvent { payload: AgentEventPayload::AgentStart { .. }, .. }
    ));

    send_frame(
        &mut ws,
        &ClientFrame::CancelRequest {
            id: "cancel-1".into(),
            request_id,
        },
    )
    .await;
    let _ack = recv_frame(&mut ws).await;

    let cancelled = recv_frame(&mut ws).await;
    let ServerFrame::AgentEvent { payload: AgentEventPayload::AgentError { code, .. }, .. } = cancelled else {
        panic!("expected agent-error event");
    };
    assert_eq!(code, "Cancelled");
}

#[tokio::test]
async fn two_nodes_can_broadcast_within_a_group() {
    let gateway = start_gateway(Arc::new(EchoRunner)).await;

    let (mut ws1, _) = tokio_tungstenite::connect_async(gateway.ws_url()).await.unwrap();
    send_frame(&mut ws1, &connect_frame("c1")).await;
    let _ = recv_frame(&mut ws1).await;
    send_frame(
        &mut ws1,
        &ClientFrame::Register {
            id: "reg1".into(),
            name: Some("node-1".into()),
            capabilities: vec![],
        },
    )
    .await;
    let _ = recv_frame(&mut ws1).await;
    send_frame(
        &mut ws1,
        &ClientFrame::JoinGroup {
            id: "j1".into(),
            group_name: "room".into(),
            strategy: None,
        },
    )
    .await;
    let _ = recv_frame(&mut ws1).await;

    let (mut ws2, _) = tokio_tungstenite::connect_async(gateway.ws_url()).await.unwrap();
    send_frame(&mut ws2, &connect_frame("c2")).await;
    let _ = recv_frame(&mut ws2).await;
    send_frame(
        &mut ws2,
        &ClientFrame::Register {
            id: "reg2".into(),
            name: Some("node-2".into()),
            capabilities: vec![],
        },
    )
    .await;
    let _ = recv_frame(&mut ws2).await;
    send_frame(
        &mut ws2,
        &ClientFrame::JoinGroup {
            id: "j2".into(),
            group_name: "room".into(),
            strategy: None,
        },
    )
    .await;
    let _ = recv_frame(&mut ws2).await;

    send_frame(
        &mut ws1,
        &ClientFrame::Broadcast {
            id: "b1".into(),
            group_id: "room".into(),
            payload: serde_json::json!({"text": "hi room"}),
        },
    )
    .await;
    let ack = recv_frame(&mut ws1).await;
    let ServerFrame::Response { ok: true, payload, .. } = ack else {
        panic!("expected ok response to broadcast");
    };
    assert_eq!(payload.unwrap()["delivered"], 1);

    let received = recv_frame(&mut ws2).await;
    let ServerFrame::Broadcast { payload, .. } = received else {
        panic!("expected broadcast frame on the other node");
    };
    assert_eq!(payload["text"], "hi room");
}

async fn connect_register_and_join(gateway: &TestGateway, client_id: &str, group: &str, strategy: Option<wingman_protocol::GroupStrategy>) -> WsStream {
    let (mut ws, _) = tokio_tungstenite::connect_async(gateway.ws_url()).await.unwrap();
    send_frame(&mut ws, &connect_frame(client_id)).await;
    let _ = recv_frame(&mut ws).await;
    send_frame(
        &mut ws,
        &ClientFrame::Register {
            id: format!("{client_id}-reg"),
            name: None,
            capabilities: vec![],
        },
    )
    .await;
    let _ = recv_frame(&mut ws).await;
    send_frame(
        &mut ws,
        &ClientFrame::JoinGroup {
            id: format!("{client_id}-join"),
            group_name: group.into(),
            strategy,
        },
    )
    .await;
    let _ = recv_frame(&mut ws).await;
    ws
}

#[tokio::test]
async fn sequential_broadcast_delivers_in_order_to_every_member() {
    let gateway = start_gateway(Arc::new(EchoRunner)).await;

    let mut sender = connect_register_and_join(&gateway, "s", "room", Some(wingman_protocol::GroupStrategy::Sequential)).await;
    let mut r1 = connect_register_and_join(&gateway, "r1", "room", None).await;
    let mut r2 = connect_register_and_join(&gateway, "r2", "room", None).await;

    for n in [1, 2] {
        send_frame(
            &mut sender,
            &ClientFrame::Broadcast {
                id: format!("b{n}"),
                group_id: "room".into(),
                payload: serde_json::json!({"n": n}),
            },
        )
        .await;
        let ack = recv_frame(&mut sender).await;
        assert!(matches!(ack, ServerFrame::Response { ok: true, .. }));
    }

    for recipient in [&mut r1, &mut r2] {
        let first = recv_frame(recipient).await;
        let ServerFrame::Broadcast { payload, .. } = first else {
            panic!("expected first broadcast frame");
        };
        assert_eq!(payload["n"], 1);

        let second = recv_frame(recipient).await;
        let ServerFrame::Broadcast { payload, .. } = second else {
            panic!("expected second broadcast frame");
        };
        assert_eq!(payload["n"], 2);
    }
}

#[tokio::test]
async fn bridge_send_and_poll_round_trip_without_a_socket() {
    let gateway = start_gateway(Arc::new(EchoRunner)).await;
    let client = reqwest::Client::new();

    let connect = serde_json::to_string(&connect_frame("c1")).unwrap();
    let resp = client
        .post(gateway.http_url("/bridge/send"))
        .body(connect)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let conn_id = body["clientId"].as_str().unwrap().to_string();

    let ping = serde_json::to_string(&ClientFrame::Ping { id: "p1".into(), timestamp: 1 }).unwrap();
    let resp = client
        .post(gateway.http_url("/bridge/send"))
        .header("X-Node-ID", &conn_id)
        .body(ping)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    let resp = client
        .get(gateway.http_url(&format!("/bridge/poll?pollTimeoutMs=500")))
        .header("X-Node-ID", &conn_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let frames = body["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "pong");
}

#[tokio::test]
async fn stale_node_is_evicted_once_heartbeat_times_out() {
    let gateway = start_gateway(Arc::new(BlocksUntilCancelled)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(gateway.ws_url()).await.unwrap();
    send_frame(&mut ws, &connect_frame("c1")).await;
    let _ = recv_frame(&mut ws).await;
    send_frame(
        &mut ws,
        &ClientFrame::Register {
            id: "reg1".into(),
            name: None,
            capabilities: vec![],
        },
    )
    .await;
    let _ = recv_frame(&mut ws).await;

    send_frame(
        &mut ws,
        &ClientFrame::JoinGroup {
            id: "j1".into(),
            group_name: "room".into(),
            strategy: None,
        },
    )
    .await;
    let _ = recv_frame(&mut ws).await;

    send_frame(
        &mut ws,
        &ClientFrame::RequestAgent {
            id: "r1".into(),
            payload: wingman_protocol::RequestAgentPayload {
                agent_id: Some("assistant".into()),
                content: Some("hi".into()),
                ..Default::default()
            },
        },
    )
    .await;
    let _ack = recv_frame(&mut ws).await;
    let start = recv_frame(&mut ws).await;
    assert!(matches!(
        start,
        ServerFrame::AgentEvent { payload: AgentEventPayload::AgentStart { .. }, .. }
    ));

    let resp = reqwest::get(gateway.http_url("/stats")).await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["totalNodes"], 1);
    assert_eq!(gateway.state.groups.members("room").await.len(), 1);

    // Drive a single sweep pass directly with a zero timeout, rather than
    // waiting on `ping_interval_ms` of wall-clock time, so eviction is
    // deterministic regardless of the configured interval.
    wingman_gateway::sweeper::sweep_once(&gateway.state, Duration::from_millis(0)).await;

    let cancelled = recv_frame(&mut ws).await;
    let ServerFrame::AgentEvent { payload: AgentEventPayload::AgentError { code, .. }, .. } = cancelled else {
        panic!("expected agent-error event after eviction");
    };
    assert_eq!(code, "Cancelled");

    let resp = reqwest::get(gateway.http_url("/stats")).await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["totalNodes"], 0);
    assert_eq!(gateway.state.groups.members("room").await.len(), 0);
}
