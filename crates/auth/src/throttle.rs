//! Per-IP cooldown for failed connect handshakes.
//!
//! A single sliding window per source IP, separate from any HTTP-layer
//! request throttling the gateway applies to its `/api/*` surface — this one
//! only counts *failed* `connect` attempts, per §4.8's brute-force guard.

use std::{
    net::IpAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};

const CLEANUP_EVERY_FAILURES: u64 = 256;

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started_at: Instant,
    count: usize,
}

/// Sliding-window cooldown: an IP that racks up `max_failures` failed
/// handshakes within `window` is blocked until the window rolls over.
#[derive(Clone)]
pub struct HandshakeThrottle {
    max_failures: usize,
    window: Duration,
    buckets: Arc<DashMap<IpAddr, WindowState>>,
    failures_seen: Arc<AtomicU64>,
}

impl HandshakeThrottle {
    /// 10 failed handshakes per minute, per §4.8.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(10, Duration::from_secs(60))
    }

    #[must_use]
    pub fn with_limit(max_failures: usize, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            buckets: Arc::new(DashMap::new()),
            failures_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether `ip` is currently cooling down from prior failures.
    #[must_use]
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.is_blocked_at(ip, Instant::now())
    }

    fn is_blocked_at(&self, ip: IpAddr, now: Instant) -> bool {
        match self.buckets.get(&ip) {
            Some(state) if now.duration_since(state.started_at) < self.window => {
                state.count >= self.max_failures
            },
            _ => false,
        }
    }

    /// Record a failed handshake from `ip`, rolling the window over if it has
    /// expired.
    pub fn record_failure(&self, ip: IpAddr) {
        self.record_failure_at(ip, Instant::now());
    }

    fn record_failure_at(&self, ip: IpAddr, now: Instant) {
        match self.buckets.entry(ip) {
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();
                if now.duration_since(state.started_at) >= self.window {
                    state.started_at = now;
                    state.count = 1;
                } else {
                    state.count += 1;
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(WindowState {
                    started_at: now,
                    count: 1,
                });
            },
        }
        self.cleanup_if_needed(now);
    }

    /// A successful handshake clears the IP's failure history.
    pub fn record_success(&self, ip: IpAddr) {
        self.buckets.remove(&ip);
    }

    fn cleanup_if_needed(&self, now: Instant) {
        let seen = self.failures_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if !seen.is_multiple_of(CLEANUP_EVERY_FAILURES) {
            return;
        }
        let stale_after = self.window.saturating_mul(3);
        self.buckets
            .retain(|_, state| now.duration_since(state.started_at) <= stale_after);
    }
}

impl Default for HandshakeThrottle {
    fn default() -> Self {
        Self::new()
    }
}
