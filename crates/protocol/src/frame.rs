use serde::{Deserialize, Serialize};

use crate::{AgentEventPayload, AuthPayload, ClientDescriptor, RequestAgentPayload};

/// Machine-readable error shape carried on `error` frames and `res{ok:false}`
/// replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// Fanout strategy for a broadcast group, fixed at creation (first
/// `join_group` to name a previously-unknown group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStrategy {
    #[default]
    Parallel,
    Sequential,
}

/// Frames accepted from clients. Tagged on `type` so a malformed or unknown
/// frame fails to deserialize rather than silently matching the wrong arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "connect")]
    Connect {
        id: String,
        client: ClientDescriptor,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth: Option<AuthPayload>,
    },
    #[serde(rename = "register")]
    Register {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        capabilities: Vec<String>,
    },
    #[serde(rename = "unregister")]
    Unregister { id: String },
    #[serde(rename = "join_group")]
    JoinGroup {
        id: String,
        #[serde(rename = "groupId")]
        group_name: String,
        /// Only consulted the first time this group name is joined by
        /// anyone; ignored (the existing group's strategy wins) thereafter.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strategy: Option<GroupStrategy>,
    },
    #[serde(rename = "leave_group")]
    LeaveGroup {
        id: String,
        #[serde(rename = "groupId")]
        group_id: String,
    },
    #[serde(rename = "broadcast")]
    Broadcast {
        id: String,
        #[serde(rename = "groupId")]
        group_id: String,
        payload: serde_json::Value,
    },
    #[serde(rename = "direct")]
    Direct {
        id: String,
        #[serde(rename = "targetNodeId")]
        target_node_id: String,
        payload: serde_json::Value,
    },
    #[serde(rename = "ping")]
    Ping { id: String, timestamp: u64 },
    #[serde(rename = "req:agent")]
    RequestAgent {
        id: String,
        payload: RequestAgentPayload,
    },
    #[serde(rename = "req:agent:cancel")]
    CancelRequest {
        id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    #[serde(rename = "session_subscribe")]
    SessionSubscribe {
        id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    #[serde(rename = "session_unsubscribe")]
    SessionUnsubscribe {
        id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl ClientFrame {
    /// The `id` field every client frame carries, used to correlate a `res`
    /// reply.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            ClientFrame::Connect { id, .. }
            | ClientFrame::Register { id, .. }
            | ClientFrame::Unregister { id }
            | ClientFrame::JoinGroup { id, .. }
            | ClientFrame::LeaveGroup { id, .. }
            | ClientFrame::Broadcast { id, .. }
            | ClientFrame::Direct { id, .. }
            | ClientFrame::Ping { id, .. }
            | ClientFrame::RequestAgent { id, .. }
            | ClientFrame::CancelRequest { id, .. }
            | ClientFrame::SessionSubscribe { id, .. }
            | ClientFrame::SessionUnsubscribe { id, .. } => id,
        }
    }
}

/// Frames emitted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "res")]
    Response {
        id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    #[serde(rename = "registered")]
    Registered {
        #[serde(rename = "nodeId")]
        node_id: String,
    },
    #[serde(rename = "ack")]
    Ack { id: String },
    #[serde(rename = "event:agent")]
    AgentEvent {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        payload: AgentEventPayload,
        seq: u64,
    },
    #[serde(rename = "broadcast")]
    Broadcast {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "senderNodeId")]
        sender_node_id: String,
        payload: serde_json::Value,
    },
    #[serde(rename = "direct")]
    Direct {
        #[serde(rename = "fromNodeId")]
        from_node_id: String,
        payload: serde_json::Value,
    },
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

impl ServerFrame {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        ServerFrame::Response {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorPayload) -> Self {
        ServerFrame::Response {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            id: None,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_tags_on_type() {
        let json = serde_json::json!({"type": "ping", "id": "1", "timestamp": 42});
        let frame: ClientFrame = serde_json::from_value(json).unwrap();
        assert!(matches!(frame, ClientFrame::Ping { timestamp: 42, .. }));
    }

    #[test]
    fn unknown_frame_type_fails_to_parse() {
        let json = serde_json::json!({"type": "not_a_real_type", "id": "1"});
        let result: Result<ClientFrame, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn server_frame_ok_round_trips() {
        let frame = ServerFrame::ok("req-1", serde_json::json!({"clientId": "abc"}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "res");
        assert_eq!(json["ok"], true);
    }

    #[test]
    fn client_frame_id_extracts_correlation_id() {
        let frame = ClientFrame::Ping {
            id: "ping-1".into(),
            timestamp: 0,
        };
        assert_eq!(frame.id(), "ping-1");
    }
}
