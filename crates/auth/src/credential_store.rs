//! SQLite-backed operator credentials for the HTTP surface.
//!
//! Distinct from wire `connect` auth (see [`crate::connect`]): this is the
//! `Authorization`/`X-Gateway-Token` login flow for `/api/*`, backed by a
//! single Argon2-hashed operator password and session tokens it mints.

use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::SqlitePool;

use crate::{
    credentials::{generate_token, hash_password, verify_password},
    error::Result,
};

/// Single-operator credential store.
pub struct CredentialStore {
    pool: SqlitePool,
    setup_complete: AtomicBool,
}

impl CredentialStore {
    /// Create a store and initialize its tables.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = Self {
            pool,
            setup_complete: AtomicBool::new(false),
        };
        store.init().await?;
        let has = store.has_password().await?;
        store.setup_complete.store(has, Ordering::Relaxed);
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS operator_password (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS operator_sessions (
                token TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                expires_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[must_use]
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.load(Ordering::Relaxed)
    }

    async fn has_password(&self) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM operator_password WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Set the operator password (first-run setup). Fails if already set.
    pub async fn set_initial_password(&self, password: &str) -> Result<()> {
        if self.is_setup_complete() {
            return Err(crate::error::Error::message("operator password already set"));
        }
        let hash = hash_password(password)?;
        sqlx::query("INSERT INTO operator_password (id, password_hash) VALUES (1, ?)")
            .bind(&hash)
            .execute(&self.pool)
            .await?;
        self.setup_complete.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub async fn verify_password(&self, password: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM operator_password WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        let Some((hash,)) = row else {
            return Ok(false);
        };
        Ok(verify_password(password, &hash))
    }

    /// Change the operator password (requires the current one).
    pub async fn change_password(&self, current: &str, new_password: &str) -> Result<()> {
        if !self.verify_password(current).await? {
            return Err(crate::error::Error::unauthorized("current password is incorrect"));
        }
        let hash = hash_password(new_password)?;
        sqlx::query(
            "UPDATE operator_password SET password_hash = ?, updated_at = datetime('now') WHERE id = 1",
        )
        .bind(&hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create a new session token (30-day expiry).
    pub async fn create_session(&self) -> Result<String> {
        let token = generate_token();
        sqlx::query(
            "INSERT INTO operator_sessions (token, expires_at) VALUES (?, datetime('now', '+30 days'))",
        )
        .bind(&token)
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    /// Validate a session token. Returns true if valid and not expired.
    pub async fn validate_session(&self, token: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT token FROM operator_sessions WHERE token = ? AND expires_at > datetime('now')",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM operator_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM operator_sessions WHERE expires_at <= datetime('now')")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_lifecycle() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = CredentialStore::new(pool).await.unwrap();

        assert!(!store.is_setup_complete());
        assert!(!store.verify_password("anything").await.unwrap());

        store.set_initial_password("mypassword").await.unwrap();
        assert!(store.is_setup_complete());
        assert!(store.verify_password("mypassword").await.unwrap());
        assert!(!store.verify_password("wrong").await.unwrap());
        assert!(store.set_initial_password("again").await.is_err());

        store.change_password("mypassword", "newpass").await.unwrap();
        assert!(store.verify_password("newpass").await.unwrap());
        assert!(store.change_password("wrong", "x").await.is_err());
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = CredentialStore::new(pool).await.unwrap();

        let token = store.create_session().await.unwrap();
        assert!(store.validate_session(&token).await.unwrap());
        assert!(!store.validate_session("bogus").await.unwrap());

        store.delete_session(&token).await.unwrap();
        assert!(!store.validate_session(&token).await.unwrap());
    }
}
