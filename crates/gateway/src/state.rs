//! Shared gateway state: every registry, the scheduler, and the handful of
//! counters `/health` and `/stats` report, wired together behind one
//! `Arc<GatewayState>` cloned into every connection task and HTTP handler.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use wingman_auth::{ConnectAuthenticator, CredentialStore};
use wingman_config::{AgentsConfig, WingmanConfig};
use wingman_sessions::SessionManager;
use tokio::sync::RwLock;

use crate::{
    connections::ConnectionRegistry, groups::GroupRegistry, nodes::NodeRegistry,
    providers_api::ProvidersStore, scheduler::Scheduler, subscriptions::SubscriptionRegistry,
};

/// Shared gateway runtime state, wrapped in `Arc` for use across async
/// tasks.
pub struct GatewayState {
    pub config: WingmanConfig,
    pub version: String,
    pub hostname: String,
    pub started_at: Instant,

    pub connect_auth: ConnectAuthenticator,
    pub credentials: Arc<CredentialStore>,
    pub sessions: SessionManager,
    pub scheduler: Arc<Scheduler>,

    /// Mutable overlay over `config.agents`, seeded from it at startup.
    /// `GET/POST/PUT /api/agents*` and the routing cascade both read this,
    /// not the static config snapshot, so roster edits take effect live.
    pub agents: RwLock<AgentsConfig>,

    pub connections: ConnectionRegistry,
    pub nodes: NodeRegistry,
    pub groups: GroupRegistry,
    pub subscriptions: SubscriptionRegistry,
    pub providers: ProvidersStore,
    pub metrics: wingman_metrics::MetricsHandle,

    /// conn_id -> request_ids outstanding against it, so the heartbeat
    /// sweeper can cancel a connection's in-flight requests when it evicts
    /// the node that originated them.
    requests_by_conn: DashMap<String, Vec<String>>,

    seq: AtomicU64,
    messages_processed: AtomicU64,
}

impl GatewayState {
    #[must_use]
    pub fn new(
        config: WingmanConfig,
        connect_auth: ConnectAuthenticator,
        credentials: Arc<CredentialStore>,
        sessions: SessionManager,
        scheduler: Arc<Scheduler>,
        metrics: wingman_metrics::MetricsHandle,
    ) -> Arc<Self> {
        let nodes = NodeRegistry::new(
            config.gateway.max_nodes,
            Duration::from_millis(config.gateway.message_window_ms),
            config.gateway.message_rate_limit,
        );
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "wingman-gateway".to_string());
        let agents = RwLock::new(config.agents.clone());

        Arc::new(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname,
            started_at: Instant::now(),
            connect_auth,
            credentials,
            sessions,
            scheduler,
            agents,
            connections: ConnectionRegistry::new(),
            nodes,
            groups: GroupRegistry::new(),
            subscriptions: SubscriptionRegistry::new(),
            providers: ProvidersStore::new(),
            metrics,
            requests_by_conn: DashMap::new(),
            seq: AtomicU64::new(0),
            messages_processed: AtomicU64::new(0),
            config,
        })
    }

    /// Monotonic sequence number stamped on every `event:agent` frame, used
    /// by subscribers to detect gaps or reordering.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Disconnect cleanup: drop the connection, its node (if any), its group
    /// memberships, and its session subscriptions.
    pub async fn close_connection(&self, conn_id: &str) {
        if let Some(node) = self.nodes.unregister_by_conn(conn_id) {
            // Group/subscription cleanup is keyed by node_id, not conn_id —
            // a bare client that never registered as a node has neither.
            self.groups.leave_all(&node.node_id).await;
        }
        self.subscriptions.unsubscribe_all(conn_id);
        self.connections.remove(conn_id);
        self.requests_by_conn.remove(conn_id);
    }

    /// Records that `conn_id` originated `request_id`, so it can be
    /// cancelled if the connection's node goes stale before the request
    /// finishes.
    pub fn track_request(&self, conn_id: &str, request_id: &str) {
        self.requests_by_conn
            .entry(conn_id.to_string())
            .or_default()
            .push(request_id.to_string());
    }

    /// Drops `request_id` from `conn_id`'s outstanding set once it finishes,
    /// whichever way it finishes.
    pub fn untrack_request(&self, conn_id: &str, request_id: &str) {
        if let Some(mut ids) = self.requests_by_conn.get_mut(conn_id) {
            ids.retain(|id| id != request_id);
        }
        self.requests_by_conn.remove_if(conn_id, |_, ids| ids.is_empty());
    }

    /// Takes and clears `conn_id`'s outstanding request ids, for the
    /// heartbeat sweeper to cancel once the connection's node is evicted.
    pub fn take_requests(&self, conn_id: &str) -> Vec<String> {
        self.requests_by_conn
            .remove(conn_id)
            .map(|(_, ids)| ids)
            .unwrap_or_default()
    }
}
