//! Shared contract types
//!
//! Types exchanged between the gateway, the actors, and any front-end:
//! chat messages, rate-limit policies and decisions, and digest modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a chat message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl MessageRole {
    /// Parse a role from its stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// One turn in a lecture's conversation history
///
/// History is append-only: messages are never reordered or deleted, and
/// insertion order is conversational order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,

    /// Epoch milliseconds at append time
    pub timestamp_ms: i64,
}

impl ChatMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp_ms,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp_ms,
        }
    }
}

/// Static rate-limit configuration for one endpoint name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed in the window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_secs: u64,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Window length in milliseconds
    pub fn window_ms(&self) -> i64 {
        (self.window_secs as i64) * 1000
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Policy limit for the endpoint (sentinel `u32::MAX` when no policy
    /// is configured and the check failed open)
    pub limit: u32,

    /// Requests remaining in the current window
    pub remaining: u32,

    /// Epoch milliseconds at which the current window resets
    pub reset_at_ms: i64,

    /// Seconds the caller should wait before retrying (0 when allowed)
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    /// Fail-open decision used when no policy exists for an endpoint or
    /// the limiter itself is unavailable.
    pub fn unlimited(now_ms: i64) -> Self {
        Self {
            allowed: true,
            limit: u32::MAX,
            remaining: u32::MAX,
            reset_at_ms: now_ms,
            retry_after_secs: 0,
        }
    }
}

/// Mode of the chunked digest pipeline
///
/// Mode changes prompt wording only, never control flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    /// Produce a thorough prose summary
    Summarize,

    /// Extract key concepts and definitions
    Extract,
}

impl fmt::Display for DigestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestMode::Summarize => write!(f, "summarize"),
            DigestMode::Extract => write!(f, "extract"),
        }
    }
}
