//! Lectern SDK
//!
//! Shared library providing the contract types between the Lectern engine
//! and its front-ends: the error taxonomy, chat/rate-limit/digest types,
//! and the access-control boundary traits.

/// Access-control boundary traits
pub mod access;

/// Error types and handling
pub mod errors;

/// Shared contract types
pub mod types;

// Re-export commonly used types
pub use access::{AccessControl, LocalUser, UserId};
pub use errors::{CoreError, LecternErrorExt};
pub use types::{ChatMessage, DigestMode, MessageRole, RateLimitDecision, RateLimitPolicy};
