//! Background heartbeat sweeper: evicts nodes that stopped pinging, tearing
//! down everything a live node would otherwise hold onto (group membership,
//! session subscriptions, the connection itself, and any request it
//! originated).

use std::{sync::Arc, time::Duration};

use wingman_metrics::{gauge, system as metric};

use crate::state::GatewayState;

/// Spawns the sweep loop on the current runtime and returns immediately.
/// Mirrors this codebase's own periodic-maintenance tasks: skip the first
/// tick (it fires immediately) so eviction doesn't run before any node has
/// had a chance to connect, then run forever on `ping_interval_ms`.
pub fn spawn(state: Arc<GatewayState>) {
    let interval = Duration::from_millis(state.config.gateway.ping_interval_ms);
    let timeout = Duration::from_millis(state.config.gateway.ping_timeout_ms);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&state, timeout).await;
            gauge!(metric::UPTIME_SECONDS).set(state.uptime().as_secs_f64());
        }
    });
}

/// One sweep pass: evict stale nodes and unwind their state. Split out from
/// [`spawn`] so tests can drive a single pass deterministically instead of
/// waiting on wall-clock ticks.
pub async fn sweep_once(state: &Arc<GatewayState>, timeout: Duration) {
    let evicted = state.nodes.evict_stale(timeout);
    for node in evicted {
        tracing::info!(node_id = %node.node_id, conn_id = %node.conn_id, "sweeper: evicting stale node");
        state.groups.leave_all(&node.node_id).await;
        state.subscriptions.unsubscribe_all(&node.conn_id);
        for request_id in state.take_requests(&node.conn_id) {
            state.scheduler.cancel(&request_id);
        }
        state.connections.remove(&node.conn_id);
    }
}
