//! Broadcast Groups (§4.3): lazily created named groups of nodes, with
//! `parallel` (unordered fanout) or `sequential` (totally ordered fanout)
//! delivery strategies. The sender never receives its own broadcast.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use wingman_protocol::GroupStrategy;

use crate::error::Result;

/// A named group. Membership is a join-ordered list (not a set) because
/// `sequential` delivery order is defined by join order.
struct Group {
    strategy: GroupStrategy,
    members: Vec<String>,
    /// Serializes `sequential` broadcasts so "accepted by transport" ordering
    /// holds across concurrent broadcasters, not just within one call.
    send_lock: Mutex<()>,
}

impl Group {
    fn new(strategy: GroupStrategy) -> Self {
        Self {
            strategy,
            members: Vec::new(),
            send_lock: Mutex::new(()),
        }
    }
}

/// The registry of all broadcast groups, keyed by name.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<std::collections::HashMap<String, Arc<RwLock<Group>>>>,
}

impl GroupRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `joinGroup(name, createIfMissing=true)`: adds `node_id` to the group,
    /// creating it if absent. Joining twice is a no-op (membership unchanged
    /// on the second call).
    pub async fn join(&self, name: &str, node_id: &str, strategy: GroupStrategy) {
        let group = {
            let mut groups = self.groups.write().await;
            Arc::clone(
                groups
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(RwLock::new(Group::new(strategy)))),
            )
        };
        let mut group = group.write().await;
        if !group.members.iter().any(|m| m == node_id) {
            group.members.push(node_id.to_string());
        }
    }

    /// `leaveGroup`: a no-op if `node_id` was never a member. Removing the
    /// last member does not delete the group.
    pub async fn leave(&self, name: &str, node_id: &str) {
        let groups = self.groups.read().await;
        if let Some(group) = groups.get(name) {
            group.write().await.members.retain(|m| m != node_id);
        }
    }

    /// Remove a node from every group it belongs to (used on disconnect).
    pub async fn leave_all(&self, node_id: &str) {
        let groups = self.groups.read().await;
        for group in groups.values() {
            group.write().await.members.retain(|m| m != node_id);
        }
    }

    #[must_use]
    pub async fn count(&self) -> usize {
        self.groups.read().await.len()
    }

    #[must_use]
    pub async fn members(&self, name: &str) -> Vec<String> {
        let groups = self.groups.read().await;
        match groups.get(name) {
            Some(group) => group.read().await.members.clone(),
            None => Vec::new(),
        }
    }

    /// Broadcast `payload` from `sender_node_id` to every other member of
    /// `name`, per that group's fanout strategy. `send_one` delivers to a
    /// single node and should return `Ok` once the frame is enqueued to that
    /// node's transport (not once the peer has acknowledged it).
    pub async fn broadcast<F, Fut>(&self, name: &str, sender_node_id: &str, send_one: F) -> Result<usize>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let group = {
            let groups = self.groups.read().await;
            match groups.get(name) {
                Some(group) => Arc::clone(group),
                None => return Ok(0),
            }
        };

        let (strategy, recipients) = {
            let group = group.read().await;
            (
                group.strategy,
                group
                    .members
                    .iter()
                    .filter(|m| m.as_str() != sender_node_id)
                    .cloned()
                    .collect::<Vec<_>>(),
            )
        };

        match strategy {
            GroupStrategy::Parallel => {
                let results = futures::future::join_all(recipients.into_iter().map(send_one)).await;
                Ok(results.into_iter().filter(|r| r.is_ok()).count())
            },
            GroupStrategy::Sequential => {
                // Hold the group's send lock for the whole fanout so two
                // concurrent sequential broadcasts can't interleave.
                let _permit = group.read().await.send_lock.lock().await;
                let mut delivered = 0;
                for node_id in recipients {
                    if send_one(node_id).await.is_ok() {
                        delivered += 1;
                    }
                }
                Ok(delivered)
            },
        }
    }
}
