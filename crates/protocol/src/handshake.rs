use serde::{Deserialize, Serialize};

/// Identifying information a client presents in its `connect` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDescriptor {
    pub id: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub version: String,
    pub platform: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

/// Credentials carried on `connect.auth`. At most one of these is expected to
/// be set, depending on the gateway's configured auth mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}
