//! Session and message persistence.
//!
//! Session rows (`SessionEntry`) live in SQLite, managed by
//! [`metadata::SessionMetadata`]. Message bodies are appended to per-session
//! JSONL files, managed by [`store::SessionStore`]. Assistant-produced image
//! attachments are blobbed content-addressed by [`attachments::AttachmentStore`].
//! [`SessionManager`] composes the three into the `createSession`/
//! `appendMessage`/`clearMessages`/`getLastSession`/`listSessions` contracts.

pub mod attachments;
pub mod error;
pub mod message;
pub mod metadata;
pub mod store;

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

pub use {
    attachments::AttachmentStore,
    error::{Error, Result},
    message::{ContentBlock, MessageContent, PersistedMessage},
    metadata::{SessionEntry, SessionMetadata},
    store::{SearchResult, SessionStore},
};
use wingman_protocol::AttachmentKind;

/// Run database migrations for the sessions crate.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    SessionMetadata::init(pool).await
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Preview length (characters) stored alongside a session row.
const PREVIEW_MAX_LEN: usize = 120;

/// Ties the metadata index, message log, and attachment blob store together
/// into the Session Persistence contracts.
pub struct SessionManager {
    metadata: SessionMetadata,
    store: SessionStore,
    attachments: AttachmentStore,
}

impl SessionManager {
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool, agents_dir: PathBuf, attachments_dir: PathBuf) -> Self {
        Self {
            metadata: SessionMetadata::new(pool),
            store: SessionStore::new(agents_dir),
            attachments: AttachmentStore::new(attachments_dir),
        }
    }

    /// `createSession(agentId, name?)` — idempotent on `(agentId, key)`.
    pub async fn create_session(
        &self,
        agent_id: &str,
        key: &str,
        name: Option<&str>,
    ) -> Result<SessionEntry> {
        self.metadata.create(agent_id, key, name).await
    }

    /// `appendMessage(sessionId, message)` — rewrites any assistant image
    /// attachment to a blobbed path, appends the message to the JSONL log,
    /// and advances the session row's `updatedAt`/`messageCount`/preview.
    pub async fn append_message(
        &self,
        session: &SessionEntry,
        key: &str,
        mut message: PersistedMessage,
    ) -> Result<PersistedMessage> {
        if matches!(message, PersistedMessage::Assistant { .. }) {
            for attachment in message.attachments_mut() {
                if attachment.kind == AttachmentKind::Image {
                    self.attachments.blob_assistant_image(attachment).await?;
                }
            }
        }

        self.store.append(key, &message.to_value()).await?;

        if !message.hidden() {
            let preview = message.preview(PREVIEW_MAX_LEN);
            self.metadata.touch(&session.id, 1, Some(&preview)).await?;
        }

        Ok(message)
    }

    /// `clearMessages(sessionId)` — truncates the JSONL log and resets the
    /// session row's counters; the row itself survives.
    pub async fn clear_messages(&self, session: &SessionEntry, key: &str) -> Result<()> {
        self.store.clear(key).await?;
        self.metadata.clear_counters(&session.id).await
    }

    /// `getLastSession(agentId)`.
    pub async fn get_last_session(&self, agent_id: &str) -> Result<Option<SessionEntry>> {
        self.metadata.get_last(agent_id).await
    }

    /// `listSessions(agentId?)`.
    pub async fn list_sessions(&self, agent_id: Option<&str>) -> Result<Vec<SessionEntry>> {
        self.metadata.list(agent_id).await
    }

    pub async fn get_session(&self, agent_id: &str, key: &str) -> Result<Option<SessionEntry>> {
        self.metadata.get_by_key(agent_id, key).await
    }

    pub async fn get_session_by_id(&self, id: &str) -> Result<Option<SessionEntry>> {
        self.metadata.get_by_id(id).await
    }

    /// Delete a session outright: its row and its message log.
    pub async fn delete_session(&self, session: &SessionEntry) -> Result<bool> {
        self.store.clear(&session.key).await?;
        self.metadata.delete(&session.id).await
    }

    /// Messages for a session, in insertion order.
    pub async fn read_messages(&self, key: &str) -> Result<Vec<serde_json::Value>> {
        self.store.read(key).await
    }

    pub async fn read_last_messages(&self, key: &str, n: usize) -> Result<Vec<serde_json::Value>> {
        self.store.read_last_n(key, n).await
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.store.search(query, max_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_manager() -> (SessionManager, tempfile::TempDir) {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        SessionMetadata::init(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(
            pool,
            dir.path().join("sessions"),
            dir.path().join("attachments"),
        );
        (manager, dir)
    }

    #[tokio::test]
    async fn append_message_advances_count_and_preview() {
        let (manager, _dir) = temp_manager().await;
        let session = manager
            .create_session("agent1", "agent:agent1:main", None)
            .await
            .unwrap();

        let msg = PersistedMessage::user(session.id.clone(), "hello there", now_ms());
        manager
            .append_message(&session, "agent:agent1:main", msg)
            .await
            .unwrap();

        let after = manager
            .get_session("agent1", "agent:agent1:main")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.message_count, 1);
        assert_eq!(after.last_message_preview.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn hidden_message_does_not_advance_count() {
        let (manager, _dir) = temp_manager().await;
        let session = manager.create_session("agent1", "k1", None).await.unwrap();

        let msg = PersistedMessage::System {
            id: "m1".into(),
            session_id: session.id.clone(),
            content: MessageContent::Text("internal note".into()),
            created_at: now_ms(),
            attachments: Vec::new(),
            hidden: true,
        };
        manager.append_message(&session, "k1", msg).await.unwrap();

        let after = manager.get_session("agent1", "k1").await.unwrap().unwrap();
        assert_eq!(after.message_count, 0);
        assert!(after.last_message_preview.is_none());

        let logged = manager.read_messages("k1").await.unwrap();
        assert_eq!(logged.len(), 1);
    }

    #[tokio::test]
    async fn clear_messages_resets_counters_but_keeps_row() {
        let (manager, _dir) = temp_manager().await;
        let session = manager.create_session("agent1", "k1", None).await.unwrap();
        let msg = PersistedMessage::user(session.id.clone(), "hi", now_ms());
        manager.append_message(&session, "k1", msg).await.unwrap();

        manager.clear_messages(&session, "k1").await.unwrap();

        let after = manager.get_session("agent1", "k1").await.unwrap().unwrap();
        assert_eq!(after.message_count, 0);
        assert!(after.last_message_preview.is_none());
        assert_eq!(after.id, session.id);
        assert!(manager.read_messages("k1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_session_is_idempotent() {
        let (manager, _dir) = temp_manager().await;
        let a = manager.create_session("agent1", "k1", Some("first")).await.unwrap();
        let b = manager.create_session("agent1", "k1", Some("second")).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn list_and_get_last_session_reflect_recency() {
        let (manager, _dir) = temp_manager().await;
        let first = manager.create_session("agent1", "k1", None).await.unwrap();
        let second = manager.create_session("agent1", "k2", None).await.unwrap();
        let msg = PersistedMessage::user(second.id.clone(), "hi", now_ms());
        manager.append_message(&second, "k2", msg).await.unwrap();

        let last = manager.get_last_session("agent1").await.unwrap().unwrap();
        assert_eq!(last.id, second.id);

        let all = manager.list_sessions(Some("agent1")).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }
}
