//! Metric name and label definitions.
//!
//! Centralizing these names keeps dashboards/alert rules stable across
//! releases of the gateway.

/// HTTP surface metrics (health/stats/sessions/fs/providers).
pub mod http {
    pub const REQUESTS_TOTAL: &str = "wingman_http_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "wingman_http_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "wingman_http_requests_in_flight";
}

/// Connection Hub metrics — one WebSocket per client connection.
pub mod connection {
    pub const CONNECTIONS_TOTAL: &str = "wingman_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "wingman_connections_active";
    pub const FRAMES_RECEIVED_TOTAL: &str = "wingman_frames_received_total";
    pub const FRAMES_SENT_TOTAL: &str = "wingman_frames_sent_total";
    pub const FRAME_DROPPED_TOTAL: &str = "wingman_frame_dropped_total";
    pub const MAILBOX_DEPTH: &str = "wingman_connection_mailbox_depth";
}

/// Node Registry metrics.
pub mod nodes {
    pub const REGISTERED_TOTAL: &str = "wingman_nodes_registered_total";
    pub const ACTIVE: &str = "wingman_nodes_active";
    pub const CAPACITY_REJECTIONS_TOTAL: &str = "wingman_nodes_capacity_rejections_total";
    pub const HEARTBEAT_TIMEOUTS_TOTAL: &str = "wingman_nodes_heartbeat_timeouts_total";
}

/// Request Scheduler metrics.
pub mod requests {
    pub const DISPATCHED_TOTAL: &str = "wingman_requests_dispatched_total";
    pub const COMPLETED_TOTAL: &str = "wingman_requests_completed_total";
    pub const FAILED_TOTAL: &str = "wingman_requests_failed_total";
    pub const CANCELLED_TOTAL: &str = "wingman_requests_cancelled_total";
    pub const RETRIED_TOTAL: &str = "wingman_requests_retried_total";
    pub const DURATION_SECONDS: &str = "wingman_request_duration_seconds";
    pub const QUEUE_DEPTH: &str = "wingman_request_queue_depth";
}

/// Session store metrics.
pub mod session {
    pub const CREATED_TOTAL: &str = "wingman_sessions_created_total";
    pub const ACTIVE: &str = "wingman_sessions_active";
    pub const MESSAGES_TOTAL: &str = "wingman_session_messages_total";
    pub const PERSIST_ERRORS_TOTAL: &str = "wingman_session_persist_errors_total";
}

/// Authentication and rate-limiting metrics.
pub mod auth {
    pub const HANDSHAKE_ATTEMPTS_TOTAL: &str = "wingman_auth_handshake_attempts_total";
    pub const HANDSHAKE_FAILURES_TOTAL: &str = "wingman_auth_handshake_failures_total";
    pub const COOLDOWN_REJECTIONS_TOTAL: &str = "wingman_auth_cooldown_rejections_total";
}

/// Session Router metrics.
pub mod routing {
    pub const RESOLUTIONS_TOTAL: &str = "wingman_routing_resolutions_total";
    pub const RESOLUTION_ERRORS_TOTAL: &str = "wingman_routing_resolution_errors_total";
    pub const FALLBACK_TO_DEFAULT_TOTAL: &str = "wingman_routing_fallback_to_default_total";
}

/// Process-level metrics.
pub mod system {
    pub const UPTIME_SECONDS: &str = "wingman_uptime_seconds";
    pub const BUILD_INFO: &str = "wingman_build_info";
}

/// Common label keys used across metrics.
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const CHANNEL: &str = "channel";
    pub const ERROR_TYPE: &str = "error_type";
    pub const REASON: &str = "reason";
    pub const AGENT_ID: &str = "agent_id";
}

/// Standard histogram buckets.
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP/connection-lifecycle duration buckets in seconds, 1ms to 60s.
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Agent request duration buckets in seconds, 100ms to 10 minutes
    /// (matches `max_request_duration_ms`'s default).
    pub static REQUEST_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
        ]
    });

    /// Queue/mailbox depth buckets.
    pub static QUEUE_SIZE: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]
    });
}
