//! Error types and handling
//!
//! This module provides the error types used throughout the Lectern core.
//! All errors implement the `LecternErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Fail-open vs fail-closed
//!
//! The taxonomy encodes an availability asymmetry that callers must
//! preserve: rate-limiter failures (`ConfigurationMissing`, or any error
//! reaching the gateway from the limiter actor) fail OPEN, allowing
//! traffic rather than blocking on an internal outage. Storage and
//! inference failures fail CLOSED and are surfaced to the caller.

use thiserror::Error;

/// Trait for Lectern error extensions
///
/// Provides additional context for errors: a user-facing hint that is safe
/// to display (no keys, no internal paths) and a recoverability flag.
pub trait LecternErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller. Non-recoverable
    /// errors require operator intervention (configuration, ownership).
    fn is_recoverable(&self) -> bool;
}

/// Main core error type
///
/// Every operation exposed by the gateway or an actor reports failure
/// through this enum. Variants carry the metadata a front-end needs to
/// render the failure (retry timing for rate limits, hints for the rest).
#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No rate-limit policy is registered for the endpoint. Callers fail
    /// open on this: missing configuration must never block traffic.
    #[error("No rate-limit policy configured for endpoint: {0}")]
    ConfigurationMissing(String),

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per window, retry in {retry_after_secs}s")]
    RateLimited {
        limit: u32,
        retry_after_secs: u64,
        reset_at_ms: i64,
    },

    // Durable storage
    #[error("Durable storage unavailable: {0}")]
    StorageUnavailable(String),

    // Inference collaborator
    #[error("Inference failed: {0}")]
    InferenceError(String),

    // Lecture state
    #[error("No lecture stored under this key")]
    NotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Ownership (decided upstream; carried through unchanged)
    #[error("Not authorized to access this lecture")]
    Forbidden,

    // Actor dispatch
    #[error("Actor call timed out")]
    DispatchTimeout,

    #[error("Actor mailbox closed")]
    MailboxClosed,

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LecternErrorExt for CoreError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::ConfigurationMissing(_) => {
                "Endpoint has no rate-limit policy; requests are not being limited"
            }
            Self::RateLimited { .. } => "Rate limit exceeded. Please wait before trying again",
            Self::StorageUnavailable(_) => "Storage operation failed. Try again shortly",
            Self::InferenceError(_) => "The AI service failed to respond. Try again",
            Self::NotFound => "Upload a lecture first, then retry",
            Self::InvalidInput(_) => "The request was rejected. Check the input and retry",
            Self::Forbidden => "You do not own this lecture",
            Self::DispatchTimeout => "Operation took too long. It may still complete; retry later",
            Self::MailboxClosed => "Internal worker stopped. Retry the operation",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Operator-side problems
            Self::Config(_) | Self::ConfigurationMissing(_) => false,
            // The ownership decision will not change on retry
            Self::Forbidden => false,
            // All other errors are potentially recoverable
            _ => true,
        }
    }
}
