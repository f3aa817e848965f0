//! Lecture state repository
//!
//! Raw lecture text plus its append-only chat history, keyed by the lecture
//! actor key. History rows are ordered by rowid: insertion order is
//! conversational order even when two appends land in the same millisecond.

use sdk::errors::CoreError;
use sdk::types::{ChatMessage, MessageRole};
use sqlx::{Row, SqlitePool};

/// A persisted lecture record
#[derive(Debug, Clone)]
pub struct StoredLecture {
    pub raw_text: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Repository for lecture text and chat history
pub struct LectureStore {
    pool: SqlitePool,
}

impl LectureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the raw text for a lecture key
    ///
    /// A new upload normally creates a new key, so overwrite is the rare
    /// path, but the operation stays idempotent either way.
    pub async fn upsert_raw_text(
        &self,
        actor_key: &str,
        raw_text: &str,
        now_ms: i64,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO lectures (actor_key, raw_text, created_at_ms, updated_at_ms) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (actor_key) DO UPDATE SET \
                 raw_text = excluded.raw_text, \
                 updated_at_ms = excluded.updated_at_ms",
        )
        .bind(actor_key)
        .bind(raw_text)
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Load the lecture record for a key, if it has been initialized
    pub async fn load(&self, actor_key: &str) -> Result<Option<StoredLecture>, CoreError> {
        let row = sqlx::query(
            "SELECT raw_text, created_at_ms, updated_at_ms FROM lectures WHERE actor_key = ?",
        )
        .bind(actor_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|row| StoredLecture {
            raw_text: row.get("raw_text"),
            created_at_ms: row.get("created_at_ms"),
            updated_at_ms: row.get("updated_at_ms"),
        }))
    }

    /// Append one message to a lecture's history
    pub async fn append_message(
        &self,
        actor_key: &str,
        message: &ChatMessage,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO chat_messages (actor_key, role, content, timestamp_ms) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(actor_key)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.timestamp_ms)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Fetch the full history for a key in conversational order
    pub async fn history(&self, actor_key: &str) -> Result<Vec<ChatMessage>, CoreError> {
        let rows = sqlx::query(
            "SELECT role, content, timestamp_ms FROM chat_messages \
             WHERE actor_key = ? ORDER BY id",
        )
        .bind(actor_key)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let role_str: String = row.get("role");
            let role = MessageRole::parse(&role_str).ok_or_else(|| {
                CoreError::StorageUnavailable(format!("unknown stored role: {}", role_str))
            })?;
            messages.push(ChatMessage {
                role,
                content: row.get("content"),
                timestamp_ms: row.get("timestamp_ms"),
            });
        }

        Ok(messages)
    }
}

fn storage_err(e: sqlx::Error) -> CoreError {
    CoreError::StorageUnavailable(e.to_string())
}
