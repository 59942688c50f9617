//! SQLite-backed index of session rows (the Session entity, minus its
//! message log, which lives in [`crate::store::SessionStore`]).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A session row, matching the Session entity's attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub key: String,
    pub name: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    #[serde(rename = "messageCount")]
    pub message_count: u32,
    #[serde(rename = "lastMessagePreview")]
    pub last_message_preview: Option<String>,
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub version: u64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    agent_id: String,
    key: String,
    name: Option<String>,
    created_at: i64,
    updated_at: i64,
    message_count: i64,
    last_message_preview: Option<String>,
    metadata: String,
    version: i64,
}

impl From<SessionRow> for SessionEntry {
    fn from(r: SessionRow) -> Self {
        Self {
            id: r.id,
            agent_id: r.agent_id,
            key: r.key,
            name: r.name,
            created_at: r.created_at,
            updated_at: r.updated_at,
            message_count: u32::try_from(r.message_count).unwrap_or(0),
            last_message_preview: r.last_message_preview,
            metadata: serde_json::from_str(&r.metadata).unwrap_or(serde_json::Value::Null),
            version: u64::try_from(r.version).unwrap_or(0),
        }
    }
}

/// The `sessions` table: one row per `(agentId, key)` pair.
pub struct SessionMetadata {
    pool: sqlx::SqlitePool,
}

impl SessionMetadata {
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `sessions` table and its indexes if they don't exist.
    pub async fn init(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS sessions (
                id                   TEXT    PRIMARY KEY,
                agent_id             TEXT    NOT NULL,
                key                  TEXT    NOT NULL,
                name                 TEXT,
                created_at           INTEGER NOT NULL,
                updated_at           INTEGER NOT NULL,
                message_count        INTEGER NOT NULL DEFAULT 0,
                last_message_preview TEXT,
                metadata             TEXT    NOT NULL DEFAULT '{}',
                version              INTEGER NOT NULL DEFAULT 0,
                UNIQUE(agent_id, key)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_agent_updated ON sessions(agent_id, updated_at)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// `createSession(agentId, name?)` — idempotent: returns the existing
    /// row for `(agentId, key)` if one is already present.
    pub async fn create(
        &self,
        agent_id: &str,
        key: &str,
        name: Option<&str>,
    ) -> Result<SessionEntry> {
        if let Some(existing) = self.get_by_key(agent_id, key).await? {
            return Ok(existing);
        }

        let now = now_ms();
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r"INSERT INTO sessions
                (id, agent_id, key, name, created_at, updated_at, message_count, metadata, version)
              VALUES (?, ?, ?, ?, ?, ?, 0, '{}', 0)
              ON CONFLICT(agent_id, key) DO NOTHING",
        )
        .bind(&id)
        .bind(agent_id)
        .bind(key)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_key(agent_id, key)
            .await?
            .ok_or_else(|| crate::error::Error::message("session row vanished after insert"))
    }

    pub async fn get_by_key(&self, agent_id: &str, key: &str) -> Result<Option<SessionEntry>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE agent_id = ? AND key = ?",
        )
        .bind(agent_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<SessionEntry>> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// `appendMessage` bookkeeping: advance `updatedAt`, and increment
    /// `messageCount`/refresh the preview unless the message is hidden.
    pub async fn touch(
        &self,
        id: &str,
        message_count_delta: i64,
        preview: Option<&str>,
    ) -> Result<()> {
        let now = now_ms();
        if let Some(preview) = preview {
            sqlx::query(
                r"UPDATE sessions
                   SET message_count = message_count + ?,
                       last_message_preview = ?,
                       updated_at = ?,
                       version = version + 1
                   WHERE id = ?",
            )
            .bind(message_count_delta)
            .bind(preview)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r"UPDATE sessions
                   SET message_count = message_count + ?,
                       updated_at = ?,
                       version = version + 1
                   WHERE id = ?",
            )
            .bind(message_count_delta)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// `clearMessages(sessionId)` — resets the counters; the session row
    /// itself, including `createdAt`, is preserved.
    pub async fn clear_counters(&self, id: &str) -> Result<()> {
        sqlx::query(
            r"UPDATE sessions
               SET message_count = 0,
                   last_message_preview = NULL,
                   version = version + 1
               WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `getLastSession(agentId)` — most recently updated session, if any.
    pub async fn get_last(&self, agent_id: &str) -> Result<Option<SessionEntry>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE agent_id = ? ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Delete a session row outright. Returns `true` if a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `listSessions(agentId?)` — sessions sorted by `updatedAt` desc,
    /// optionally scoped to one agent.
    pub async fn list(&self, agent_id: Option<&str>) -> Result<Vec<SessionEntry>> {
        let rows = match agent_id {
            Some(agent_id) => {
                sqlx::query_as::<_, SessionRow>(
                    "SELECT * FROM sessions WHERE agent_id = ? ORDER BY updated_at DESC",
                )
                .bind(agent_id)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions ORDER BY updated_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            },
        };
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
