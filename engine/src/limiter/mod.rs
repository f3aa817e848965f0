//! Rate limiting module
//!
//! Fixed-window rate limiting, one actor per identifier (`user:<id>` or
//! `ip:<addr>`). Each actor owns a mapping of endpoint name to persisted
//! window; the actor runtime serializes access per identifier, which folds
//! "check" and "increment" into one uninterruptible step and removes the
//! classic check-then-act race without any lock.
//!
//! Expired windows are replaced lazily on next access, never swept.
//! Unknown endpoints fail open: missing configuration must never block
//! traffic.

use crate::actor::Actor;
use crate::db::windows::{StoredWindow, WindowStore};
use sdk::errors::CoreError;
use sdk::types::{RateLimitDecision, RateLimitPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Operations accepted by a rate limiter actor
#[derive(Debug, Clone)]
pub enum LimiterRequest {
    /// Serialized check-then-increment for one endpoint
    CheckAndIncrement { endpoint: String },

    /// Read-only preview of the decision; never mutates the window
    Check { endpoint: String },

    /// Delete the stored window for one endpoint
    Reset { endpoint: String },

    /// Delete every stored window for this identifier
    ResetAll,
}

/// Reply from a rate limiter actor
#[derive(Debug, Clone)]
pub enum LimiterReply {
    /// Outcome of a check operation
    Decision(RateLimitDecision),

    /// A reset completed
    Reset,
}

/// Fixed-window rate limiter for a single identifier
pub struct RateLimiterActor {
    key: String,
    store: WindowStore,
    policies: Arc<HashMap<String, RateLimitPolicy>>,
}

impl RateLimiterActor {
    /// Create the limiter actor for one identifier
    pub fn new(
        key: impl Into<String>,
        store: WindowStore,
        policies: Arc<HashMap<String, RateLimitPolicy>>,
    ) -> Self {
        Self {
            key: key.into(),
            store,
            policies,
        }
    }

    /// Check the window for `endpoint` and count this request if allowed
    async fn check_and_increment(&self, endpoint: &str) -> Result<RateLimitDecision, CoreError> {
        let now = now_ms();

        let Some(policy) = self.policies.get(endpoint).copied() else {
            warn!(
                "No rate-limit policy configured for endpoint {}; failing open for {}",
                endpoint, self.key
            );
            return Ok(RateLimitDecision::unlimited(now));
        };

        // Absent or elapsed window: open a fresh one and persist it before
        // counting against it.
        let window = match self.store.load(&self.key, endpoint).await? {
            Some(window) if !window.is_expired(now) => window,
            _ => {
                let fresh = StoredWindow {
                    count: 0,
                    window_start_ms: now,
                    window_ms: policy.window_ms(),
                };
                self.store.save(&self.key, endpoint, fresh).await?;
                fresh
            }
        };

        let reset_at_ms = window.reset_at_ms();

        if window.count >= policy.max_requests {
            let retry_after_secs = retry_after_secs(reset_at_ms, now);
            debug!(
                "Denied {} on {}: {}/{} in window",
                self.key, endpoint, window.count, policy.max_requests
            );
            return Ok(RateLimitDecision {
                allowed: false,
                limit: policy.max_requests,
                remaining: 0,
                reset_at_ms,
                retry_after_secs,
            });
        }

        let updated = StoredWindow {
            count: window.count + 1,
            ..window
        };
        self.store.save(&self.key, endpoint, updated).await?;

        Ok(RateLimitDecision {
            allowed: true,
            limit: policy.max_requests,
            remaining: policy.max_requests - updated.count,
            reset_at_ms,
            retry_after_secs: 0,
        })
    }

    /// Compute the decision for `endpoint` without touching stored state
    async fn check(&self, endpoint: &str) -> Result<RateLimitDecision, CoreError> {
        let now = now_ms();

        let Some(policy) = self.policies.get(endpoint).copied() else {
            warn!(
                "No rate-limit policy configured for endpoint {}; failing open for {}",
                endpoint, self.key
            );
            return Ok(RateLimitDecision::unlimited(now));
        };

        // An absent or elapsed window is previewed as fresh but NOT
        // persisted; only counting calls may write.
        let window = match self.store.load(&self.key, endpoint).await? {
            Some(window) if !window.is_expired(now) => window,
            _ => StoredWindow {
                count: 0,
                window_start_ms: now,
                window_ms: policy.window_ms(),
            },
        };

        let reset_at_ms = window.reset_at_ms();
        let denied = window.count >= policy.max_requests;

        Ok(RateLimitDecision {
            allowed: !denied,
            limit: policy.max_requests,
            remaining: policy.max_requests.saturating_sub(window.count),
            reset_at_ms,
            retry_after_secs: if denied {
                retry_after_secs(reset_at_ms, now)
            } else {
                0
            },
        })
    }
}

#[async_trait::async_trait]
impl Actor for RateLimiterActor {
    type Request = LimiterRequest;
    type Response = Result<LimiterReply, CoreError>;

    async fn handle(&mut self, request: LimiterRequest) -> Self::Response {
        match request {
            LimiterRequest::CheckAndIncrement { endpoint } => self
                .check_and_increment(&endpoint)
                .await
                .map(LimiterReply::Decision),
            LimiterRequest::Check { endpoint } => {
                self.check(&endpoint).await.map(LimiterReply::Decision)
            }
            LimiterRequest::Reset { endpoint } => {
                self.store.delete(&self.key, &endpoint).await?;
                Ok(LimiterReply::Reset)
            }
            LimiterRequest::ResetAll => {
                self.store.delete_all(&self.key).await?;
                Ok(LimiterReply::Reset)
            }
        }
    }
}

/// Seconds until `reset_at_ms`, rounded up, clamped to zero
fn retry_after_secs(reset_at_ms: i64, now_ms: i64) -> u64 {
    let remaining_ms = (reset_at_ms - now_ms).max(0) as u64;
    remaining_ms.div_ceil(1000)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
