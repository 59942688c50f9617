//! Gateway configuration schema: `.wingman/wingman.config.json`.

use serde::{Deserialize, Serialize};
use wingman_routing::Binding;

/// Root configuration, loaded from `.wingman/wingman.config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WingmanConfig {
    pub log_level: String,
    pub recursion_limit: u32,
    pub default_agent: Option<String>,
    pub gateway: GatewayConfig,
    pub agents: AgentsConfig,
    /// Opaque passthrough — the gateway does not interpret search provider
    /// configuration, only preserves it across load/save round trips.
    pub search: serde_json::Value,
    /// Opaque passthrough — skills are authored and resolved outside the
    /// gateway; it only reads the resolved agent set.
    pub skills: serde_json::Value,
}

impl Default for WingmanConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            recursion_limit: 50,
            default_agent: None,
            gateway: GatewayConfig::default(),
            agents: AgentsConfig::default(),
            search: serde_json::Value::Null,
            skills: serde_json::Value::Null,
        }
    }
}

/// Gateway network, auth, and resource-limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub fs_roots: Vec<String>,
    pub max_nodes: usize,
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
    pub message_window_ms: u64,
    pub message_rate_limit: u32,
    pub max_frame_bytes: usize,
    pub max_concurrent_requests: usize,
    pub graceful_shutdown_ms: u64,
    pub max_request_duration_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            auth: AuthConfig::default(),
            fs_roots: Vec::new(),
            max_nodes: 1_000,
            ping_interval_ms: wingman_protocol::DEFAULT_PING_INTERVAL_MS,
            ping_timeout_ms: wingman_protocol::DEFAULT_PING_TIMEOUT_MS,
            message_window_ms: 60_000,
            message_rate_limit: 100,
            max_frame_bytes: wingman_protocol::DEFAULT_MAX_FRAME_BYTES,
            max_concurrent_requests: 64,
            graceful_shutdown_ms: wingman_protocol::DEFAULT_GRACEFUL_SHUTDOWN_MS,
            max_request_duration_ms: wingman_protocol::DEFAULT_MAX_REQUEST_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Token,
    Password,
}

/// Connect-time authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
    pub password: Option<String>,
    pub allow_tailscale: bool,
}

/// A single configured agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentEntry {
    pub id: String,
    pub name: Option<String>,
}

impl Default for AgentEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
        }
    }
}

/// Agent roster and routing bindings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentsConfig {
    pub list: Vec<AgentEntry>,
    pub bindings: Vec<Binding>,
}

impl AgentsConfig {
    /// Agent ids in configuration order, for the "first configured agent"
    /// fallback in the Session Router's binding cascade.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<String> {
        self.list.iter().map(|a| a.id.clone()).collect()
    }
}
