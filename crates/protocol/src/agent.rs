use serde::{Deserialize, Serialize};

/// Role of a message in a session's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

/// Kind of an attachment carried on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    File,
}

/// An attachment on a request or a persisted message. Exactly one of
/// `data_url` / `path` is populated at any point in its lifetime: uploads
/// arrive as `data_url`, and assistant-produced images are rewritten to
/// `path` once blobbed (see `wingman_sessions::attachments`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    #[serde(rename = "dataUrl", skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A peer reference within a routing selector: `{kind: "dm"|"channel"|...,
/// id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub kind: String,
    pub id: String,
}

/// The logical address of an inbound message, used by the Session Router to
/// resolve `(agentId, sessionKey)`. All fields are optional — an absent
/// `RoutingSelector`, or one with only `peer.kind == "dm"`, resolves to the
/// agent's default main session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(rename = "accountId", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(rename = "guildId", skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(rename = "teamId", skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerRef>,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Payload of a `req:agent` client frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestAgentPayload {
    #[serde(rename = "agentId", skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingSelector>,
    #[serde(rename = "sessionKey", skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(rename = "queueIfBusy", skip_serializing_if = "Option::is_none")]
    pub queue_if_busy: Option<bool>,
}

/// Subtypes of the `event:agent` frame's `payload.type`, carried to both the
/// originator and every session subscriber by the Event Fanout component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEventPayload {
    #[serde(rename = "agent-start")]
    AgentStart {
        #[serde(rename = "agentId")]
        agent_id: String,
        #[serde(rename = "sessionKey")]
        session_key: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    #[serde(rename = "request-queued")]
    RequestQueued {
        position: usize,
    },
    #[serde(rename = "agent-stream")]
    AgentStream {
        chunk: String,
        #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(rename = "isDelta")]
        is_delta: bool,
        #[serde(rename = "eventKey", skip_serializing_if = "Option::is_none")]
        event_key: Option<String>,
        #[serde(
            rename = "streamMessageId",
            skip_serializing_if = "Option::is_none"
        )]
        stream_message_id: Option<String>,
    },
    #[serde(rename = "tool-start")]
    ToolStart {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
    #[serde(rename = "tool-end")]
    ToolEnd {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
    },
    #[serde(rename = "tool-error")]
    ToolError {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        message: String,
    },
    #[serde(rename = "agent-complete")]
    AgentComplete {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    #[serde(rename = "agent-error")]
    AgentError {
        code: String,
        message: String,
    },
}

impl AgentEventPayload {
    /// `true` for the subtypes that terminate a request's lifecycle stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEventPayload::AgentComplete { .. } | AgentEventPayload::AgentError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_event_payload_tags_round_trip() {
        let ev = AgentEventPayload::AgentStream {
            chunk: "hi".into(),
            message_id: Some("m1".into()),
            is_delta: true,
            event_key: None,
            stream_message_id: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "agent-stream");
        let back: AgentEventPayload = serde_json::from_value(json).unwrap();
        assert!(matches!(back, AgentEventPayload::AgentStream { is_delta: true, .. }));
    }

    #[test]
    fn terminal_events_are_identified() {
        assert!(AgentEventPayload::AgentComplete { message_id: "m".into() }.is_terminal());
        assert!(
            AgentEventPayload::AgentError {
                code: "Cancelled".into(),
                message: "cancelled".into(),
            }
            .is_terminal()
        );
        assert!(!AgentEventPayload::RequestQueued { position: 0 }.is_terminal());
    }
}
