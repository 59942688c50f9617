//! Connection Hub's client table (§4.1): every live connection's outbound
//! mailbox, keyed by connection id. A connection is either a live WebSocket
//! (`Mailbox::Socket`, drained by a write task into the wire) or an HTTP
//! long-poll bridge node (`Mailbox::Backlog`, drained by `/bridge/poll`) —
//! both are bounded per §5, so a slow consumer backpressures rather than
//! growing without limit.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Notify, mpsc};
use wingman_metrics::{counter, gauge, connection as metric};

use wingman_protocol::DEFAULT_MAILBOX_DEPTH;

/// In-memory per-node backlog standing in for a live socket on the HTTP
/// bridge transport (§4.1's "semantically equivalent" framing note).
struct Backlog {
    queue: tokio::sync::Mutex<VecDeque<String>>,
    capacity: usize,
    notify: Notify,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self {
            queue: tokio::sync::Mutex::new(VecDeque::new()),
            capacity,
            notify: Notify::new(),
        }
    }

    fn try_push(&self, frame: String) -> bool {
        let Ok(mut queue) = self.queue.try_lock() else {
            return false;
        };
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(frame);
        drop(queue);
        self.notify.notify_waiters();
        true
    }

    /// Drain the backlog, waiting up to `timeout` for at least one frame if
    /// it's currently empty. Returns an empty vec if nothing arrived in time.
    async fn drain_wait(&self, timeout: Duration) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut queue = self.queue.lock().await;
                if !queue.is_empty() {
                    return queue.drain(..).collect();
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Vec::new();
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

#[derive(Clone)]
enum Mailbox {
    Socket(mpsc::Sender<String>),
    Backlog(Arc<Backlog>),
}

#[derive(Clone)]
pub struct Connection {
    pub conn_id: String,
    pub node_id: Option<String>,
    mailbox: Mailbox,
}

impl Connection {
    /// Enqueue a frame. Returns `false` if the mailbox is full (the caller
    /// decides what "full" means for this frame: drop it, or close the
    /// connection with `Backpressure`).
    pub fn try_send(&self, frame_json: String) -> bool {
        let sent = match &self.mailbox {
            Mailbox::Socket(sender) => sender.try_send(frame_json).is_ok(),
            Mailbox::Backlog(backlog) => backlog.try_push(frame_json),
        };
        if !sent {
            counter!(metric::FRAME_DROPPED_TOTAL).increment(1);
        }
        sent
    }
}

pub struct ConnectionRegistry {
    connections: DashMap<String, Connection>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a WebSocket connection, returning the receive half of its
    /// outbound mailbox for the write task to drain.
    pub fn register(&self, conn_id: String) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(DEFAULT_MAILBOX_DEPTH);
        self.connections.insert(
            conn_id.clone(),
            Connection {
                conn_id,
                node_id: None,
                mailbox: Mailbox::Socket(tx),
            },
        );
        counter!(metric::CONNECTIONS_TOTAL).increment(1);
        gauge!(metric::CONNECTIONS_ACTIVE).set(self.connections.len() as f64);
        rx
    }

    /// Register an HTTP long-poll bridge connection; its mailbox is an
    /// in-memory backlog drained by [`Self::poll_bridge`] rather than a
    /// socket write task.
    pub fn register_bridge(&self, conn_id: String) {
        self.connections.insert(
            conn_id.clone(),
            Connection {
                conn_id,
                node_id: None,
                mailbox: Mailbox::Backlog(Arc::new(Backlog::new(DEFAULT_MAILBOX_DEPTH))),
            },
        );
        counter!(metric::CONNECTIONS_TOTAL).increment(1);
        gauge!(metric::CONNECTIONS_ACTIVE).set(self.connections.len() as f64);
    }

    /// `/bridge/poll`: wait up to `timeout` for backlog frames on a bridge
    /// connection. Returns `None` if `conn_id` is unknown or is a WebSocket
    /// connection (the bridge only polls bridge connections).
    pub async fn poll_bridge(&self, conn_id: &str, timeout: Duration) -> Option<Vec<String>> {
        let backlog = match self.connections.get(conn_id)?.mailbox.clone() {
            Mailbox::Backlog(backlog) => backlog,
            Mailbox::Socket(_) => return None,
        };
        Some(backlog.drain_wait(timeout).await)
    }

    pub fn set_node_id(&self, conn_id: &str, node_id: String) {
        if let Some(mut conn) = self.connections.get_mut(conn_id) {
            conn.node_id = Some(node_id);
        }
    }

    pub fn remove(&self, conn_id: &str) -> Option<Connection> {
        let removed = self.connections.remove(conn_id).map(|(_, c)| c);
        if removed.is_some() {
            gauge!(metric::CONNECTIONS_ACTIVE).set(self.connections.len() as f64);
        }
        removed
    }

    #[must_use]
    pub fn get(&self, conn_id: &str) -> Option<Connection> {
        self.connections.get(conn_id).map(|c| c.clone())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
