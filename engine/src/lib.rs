//! Lectern Engine Library
//!
//! The stateful coordination core of the Lectern study-assistant service.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Per-key actor runtime
pub mod actor;

/// Fixed-window rate limiting module
pub mod limiter;

/// Lecture memory actor module
pub mod lecture;

/// Chunked summarization / extraction pipeline
pub mod pipeline;

/// Inference collaborator abstraction
pub mod llm;

/// Gateway dispatcher module
pub mod gateway;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
