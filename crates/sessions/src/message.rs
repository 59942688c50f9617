//! Typed message structures for session storage.
//!
//! These are the JSON shape written to a session's JSONL log. The `role`
//! field discriminates the variant, matching the `{user, assistant, tool,
//! system}` role set of the Message entity.

use serde::{Deserialize, Serialize};
use wingman_protocol::Attachment;

/// A message stored in a session's JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PersistedMessage {
    System {
        id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        content: MessageContent,
        #[serde(rename = "createdAt")]
        created_at: i64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hidden: bool,
    },
    User {
        id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        content: MessageContent,
        #[serde(rename = "createdAt")]
        created_at: i64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hidden: bool,
    },
    Assistant {
        id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        content: MessageContent,
        #[serde(rename = "createdAt")]
        created_at: i64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hidden: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<PersistedToolCall>>,
    },
    Tool {
        id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        content: MessageContent,
        #[serde(rename = "createdAt")]
        created_at: i64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hidden: bool,
    },
}

/// Message content: plain text or an array of structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single block in structured content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { url: String },
}

/// A tool call recorded on an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: PersistedFunction,
}

/// Function details in a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedFunction {
    pub name: String,
    pub arguments: String,
}

impl PersistedMessage {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::System { id, .. }
            | Self::User { id, .. }
            | Self::Assistant { id, .. }
            | Self::Tool { id, .. } => id,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::System { session_id, .. }
            | Self::User { session_id, .. }
            | Self::Assistant { session_id, .. }
            | Self::Tool { session_id, .. } => session_id,
        }
    }

    #[must_use]
    pub fn created_at(&self) -> i64 {
        match self {
            Self::System { created_at, .. }
            | Self::User { created_at, .. }
            | Self::Assistant { created_at, .. }
            | Self::Tool { created_at, .. } => *created_at,
        }
    }

    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        match self {
            Self::System { attachments, .. }
            | Self::User { attachments, .. }
            | Self::Assistant { attachments, .. }
            | Self::Tool { attachments, .. } => attachments,
        }
    }

    #[must_use]
    pub fn attachments_mut(&mut self) -> &mut Vec<Attachment> {
        match self {
            Self::System { attachments, .. }
            | Self::User { attachments, .. }
            | Self::Assistant { attachments, .. }
            | Self::Tool { attachments, .. } => attachments,
        }
    }

    /// `true` for messages excluded from `messageCount` and preview text.
    #[must_use]
    pub fn hidden(&self) -> bool {
        match self {
            Self::System { hidden, .. }
            | Self::User { hidden, .. }
            | Self::Assistant { hidden, .. }
            | Self::Tool { hidden, .. } => *hidden,
        }
    }

    /// Plain-text preview, truncated to `max_len` characters.
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        let text = match self.content() {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        };
        if text.chars().count() > max_len {
            text.chars().take(max_len).collect()
        } else {
            text
        }
    }

    fn content(&self) -> &MessageContent {
        match self {
            Self::System { content, .. }
            | Self::User { content, .. }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    pub fn user(session_id: impl Into<String>, text: impl Into<String>, created_at: i64) -> Self {
        Self::User {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            content: MessageContent::Text(text.into()),
            created_at,
            attachments: Vec::new(),
            hidden: false,
        }
    }

    pub fn assistant(
        session_id: impl Into<String>,
        text: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self::Assistant {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            content: MessageContent::Text(text.into()),
            created_at,
            attachments: Vec::new(),
            hidden: false,
            tool_calls: None,
        }
    }

    /// Serialize to a JSON value for appending to the JSONL log.
    ///
    /// # Panics
    ///
    /// Never: every field type here is plain-data and serializes
    /// infallibly.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
