//! Rate-limit window repository
//!
//! One row per (actor key, endpoint) pair. A window is never swept when it
//! expires; the limiter actor overwrites it lazily on next access, so a
//! stale row is equivalent to an absent one.

use sdk::errors::CoreError;
use sqlx::{Row, SqlitePool};

/// A persisted fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredWindow {
    /// Requests counted so far in this window
    pub count: u32,

    /// Epoch milliseconds at which the window opened
    pub window_start_ms: i64,

    /// Window length in milliseconds
    pub window_ms: i64,
}

impl StoredWindow {
    /// Epoch milliseconds at which this window resets
    pub fn reset_at_ms(&self) -> i64 {
        self.window_start_ms + self.window_ms
    }

    /// Whether the window has elapsed at `now_ms`
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_at_ms()
    }
}

/// Repository for fixed rate-limit windows
pub struct WindowStore {
    pool: SqlitePool,
}

impl WindowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the window for (actor_key, endpoint), if any
    pub async fn load(
        &self,
        actor_key: &str,
        endpoint: &str,
    ) -> Result<Option<StoredWindow>, CoreError> {
        let row = sqlx::query(
            "SELECT count, window_start_ms, window_ms FROM rate_limit_windows \
             WHERE actor_key = ? AND endpoint = ?",
        )
        .bind(actor_key)
        .bind(endpoint)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|row| StoredWindow {
            count: row.get::<i64, _>("count") as u32,
            window_start_ms: row.get("window_start_ms"),
            window_ms: row.get("window_ms"),
        }))
    }

    /// Insert or overwrite the window for (actor_key, endpoint)
    ///
    /// Overwrite-on-conflict is what makes lazy expiry work: replacing a
    /// stale row with a fresh window is a single upsert.
    pub async fn save(
        &self,
        actor_key: &str,
        endpoint: &str,
        window: StoredWindow,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO rate_limit_windows (actor_key, endpoint, count, window_start_ms, window_ms) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (actor_key, endpoint) DO UPDATE SET \
                 count = excluded.count, \
                 window_start_ms = excluded.window_start_ms, \
                 window_ms = excluded.window_ms",
        )
        .bind(actor_key)
        .bind(endpoint)
        .bind(window.count as i64)
        .bind(window.window_start_ms)
        .bind(window.window_ms)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Delete the stored window for one endpoint
    pub async fn delete(&self, actor_key: &str, endpoint: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM rate_limit_windows WHERE actor_key = ? AND endpoint = ?")
            .bind(actor_key)
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Delete every stored window for an actor key
    pub async fn delete_all(&self, actor_key: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM rate_limit_windows WHERE actor_key = ?")
            .bind(actor_key)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> CoreError {
    CoreError::StorageUnavailable(e.to_string())
}
