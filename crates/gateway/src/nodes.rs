//! Node Registry (§4.2): the set of live connections, a capacity bound, a
//! per-node sliding-window message rate limit, and heartbeat tracking feeding
//! the stale-node sweeper.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use rand::RngCore;
use wingman_metrics::{counter, gauge, nodes as metric};

use crate::error::{GatewayError, Result};

/// A connected node.
#[derive(Debug, Clone)]
pub struct NodeSession {
    pub node_id: String,
    pub conn_id: String,
    pub display_name: Option<String>,
    pub capabilities: Vec<String>,
    pub remote_ip: Option<String>,
    pub connected_at: Instant,
    pub last_heartbeat: Instant,
}

/// Generate a node id: 16 cryptographically random bytes, rendered as
/// lowercase hex. Collisions are astronomically unlikely (128 bits of
/// entropy); [`NodeRegistry::register`] still rejects one outright rather
/// than silently overwriting the existing node.
#[must_use]
pub fn generate_node_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Sliding-window message counter, one bucket per node. Mirrors the
/// DashMap-backed throttle this codebase already uses for connect-time
/// cooldowns, generalized from "count of failures" to "count of messages".
struct MessageWindow {
    window: Duration,
    limit: u32,
    buckets: DashMap<String, VecDeque<Instant>>,
}

impl MessageWindow {
    fn new(window: Duration, limit: u32) -> Self {
        Self {
            window,
            limit,
            buckets: DashMap::new(),
        }
    }

    fn record_at(&self, node_id: &str, now: Instant) {
        let mut bucket = self.buckets.entry(node_id.to_string()).or_default();
        Self::evict(&mut bucket, self.window, now);
        bucket.push_back(now);
    }

    fn is_limited_at(&self, node_id: &str, now: Instant) -> bool {
        let Some(mut bucket) = self.buckets.get_mut(node_id) else {
            return false;
        };
        Self::evict(&mut bucket, self.window, now);
        bucket.len() as u32 >= self.limit
    }

    fn evict(bucket: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(&front) = bucket.front() {
            if now.duration_since(front) > window {
                bucket.pop_front();
            } else {
                break;
            }
        }
    }

    fn forget(&self, node_id: &str) {
        self.buckets.remove(node_id);
    }
}

/// Registry of connected nodes, capacity-bounded and rate-limited.
pub struct NodeRegistry {
    nodes: DashMap<String, NodeSession>,
    by_conn: DashMap<String, String>,
    max_nodes: usize,
    rate: MessageWindow,
    count: AtomicUsize,
}

impl NodeRegistry {
    #[must_use]
    pub fn new(max_nodes: usize, message_window: Duration, message_rate_limit: u32) -> Self {
        Self {
            nodes: DashMap::new(),
            by_conn: DashMap::new(),
            max_nodes,
            rate: MessageWindow::new(message_window, message_rate_limit),
            count: AtomicUsize::new(0),
        }
    }

    /// Register a node, failing with `CapacityExceeded` once `maxNodes` live
    /// nodes are already registered.
    pub fn register(&self, session: NodeSession) -> Result<()> {
        if self.count.load(Ordering::Acquire) >= self.max_nodes {
            counter!(metric::CAPACITY_REJECTIONS_TOTAL).increment(1);
            return Err(GatewayError::CapacityExceeded);
        }
        self.by_conn
            .insert(session.conn_id.clone(), session.node_id.clone());
        self.nodes.insert(session.node_id.clone(), session);
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        counter!(metric::REGISTERED_TOTAL).increment(1);
        gauge!(metric::ACTIVE).set(count as f64);
        Ok(())
    }

    pub fn unregister_by_conn(&self, conn_id: &str) -> Option<NodeSession> {
        let (_, node_id) = self.by_conn.remove(conn_id)?;
        let removed = self.nodes.remove(&node_id).map(|(_, v)| v);
        if removed.is_some() {
            let count = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
            self.rate.forget(&node_id);
            gauge!(metric::ACTIVE).set(count as f64);
        }
        removed
    }

    #[must_use]
    pub fn get(&self, node_id: &str) -> Option<NodeSession> {
        self.nodes.get(node_id).map(|n| n.clone())
    }

    #[must_use]
    pub fn list(&self) -> Vec<NodeSession> {
        self.nodes.iter().map(|n| n.clone()).collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn touch_heartbeat(&self, node_id: &str) {
        if let Some(mut node) = self.nodes.get_mut(node_id) {
            node.last_heartbeat = Instant::now();
        }
    }

    pub fn record_message(&self, node_id: &str) {
        self.rate.record_at(node_id, Instant::now());
    }

    #[must_use]
    pub fn is_rate_limited(&self, node_id: &str) -> bool {
        self.rate.is_limited_at(node_id, Instant::now())
    }

    /// Evict nodes silent longer than `ping_timeout`, returning what was
    /// evicted so callers can remove them from groups/subscriptions and
    /// cancel their outstanding requests.
    pub fn evict_stale(&self, ping_timeout: Duration) -> Vec<NodeSession> {
        let now = Instant::now();
        let stale: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| now.duration_since(n.last_heartbeat) > ping_timeout)
            .map(|n| n.node_id.clone())
            .collect();

        let evicted: Vec<NodeSession> = stale
            .into_iter()
            .filter_map(|node_id| {
                let node = self.nodes.remove(&node_id).map(|(_, v)| v)?;
                self.by_conn.remove(&node.conn_id);
                self.count.fetch_sub(1, Ordering::AcqRel);
                self.rate.forget(&node_id);
                Some(node)
            })
            .collect();

        if !evicted.is_empty() {
            counter!(metric::HEARTBEAT_TIMEOUTS_TOTAL).increment(evicted.len() as u64);
            gauge!(metric::ACTIVE).set(self.count.load(Ordering::Acquire) as f64);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(node_id: &str, conn_id: &str) -> NodeSession {
        let now = Instant::now();
        NodeSession {
            node_id: node_id.to_string(),
            conn_id: conn_id.to_string(),
            display_name: None,
            capabilities: Vec::new(),
            remote_ip: None,
            connected_at: now,
            last_heartbeat: now,
        }
    }

    #[test]
    fn node_id_is_32_lowercase_hex_chars() {
        let id = generate_node_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn registers_and_finds_by_conn() {
        let registry = NodeRegistry::new(10, Duration::from_secs(60), 100);
        registry.register(session("n1", "c1")).unwrap();
        assert_eq!(registry.count(), 1);
        assert!(registry.get("n1").is_some());

        let removed = registry.unregister_by_conn("c1").unwrap();
        assert_eq!(removed.node_id, "n1");
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn capacity_exceeded_once_max_nodes_reached() {
        let registry = NodeRegistry::new(1, Duration::from_secs(60), 100);
        registry.register(session("n1", "c1")).unwrap();
        match registry.register(session("n2", "c2")) {
            Err(GatewayError::CapacityExceeded) => {},
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_trips_after_limit_messages_in_window() {
        let registry = NodeRegistry::new(10, Duration::from_secs(60), 3);
        registry.register(session("n1", "c1")).unwrap();
        for _ in 0..3 {
            assert!(!registry.is_rate_limited("n1"));
            registry.record_message("n1");
        }
        assert!(registry.is_rate_limited("n1"));
    }

    #[test]
    fn stale_nodes_are_evicted_and_removed_from_lookup() {
        let registry = NodeRegistry::new(10, Duration::from_secs(60), 100);
        let mut stale = session("n1", "c1");
        stale.last_heartbeat = Instant::now() - Duration::from_secs(120);
        registry.register(stale).unwrap();
        registry.register(session("n2", "c2")).unwrap();

        let evicted = registry.evict_stale(Duration::from_secs(90));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].node_id, "n1");
        assert_eq!(registry.count(), 1);
        assert!(registry.get("n1").is_none());
        assert!(registry.get("n2").is_some());
    }
}
