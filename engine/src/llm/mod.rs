//! Inference collaborator abstraction
//!
//! The text-generation call is an external collaborator with latency and
//! failure characteristics outside this system's control. The
//! `TextGenerator` trait is the seam: actors and the pipeline receive an
//! `Arc<dyn TextGenerator>` through their constructors (no ambient
//! globals), and tests substitute scripted implementations.

use async_trait::async_trait;
use sdk::errors::CoreError;

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAiGenerator;

use crate::config::LlmConfig;
use std::sync::Arc;

/// Result type for inference operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur during an inference call
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LlmError> for CoreError {
    fn from(e: LlmError) -> Self {
        CoreError::InferenceError(e.to_string())
    }
}

/// Text-generation collaborator
///
/// One call per invocation; no internal retries. The caller decides
/// whether failure warrants a user-facing retry affordance.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the name of the provider (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Generate a completion for the given system and user prompts
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String>;
}

/// Build the configured provider, reading the API key from the
/// environment variable named in config.
pub fn generator_from_config(config: &LlmConfig) -> std::result::Result<Arc<dyn TextGenerator>, CoreError> {
    let api_key = std::env::var(&config.api_key_env).map_err(|_| {
        CoreError::Config(format!(
            "API key environment variable {} is not set",
            config.api_key_env
        ))
    })?;

    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config.clone(), api_key))),
        "anthropic" => Ok(Arc::new(AnthropicGenerator::new(config.clone(), api_key))),
        other => Err(CoreError::Config(format!(
            "Unknown llm.provider: {}",
            other
        ))),
    }
}

/// Map an HTTP error status to an `LlmError`, shared by the providers
pub(crate) fn error_for_status(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationFailed(body),
        429 => LlmError::RateLimitExceeded,
        500..=599 => LlmError::ProviderUnavailable(body),
        _ => LlmError::InvalidRequest(body),
    }
}

/// Map a reqwest transport failure to an `LlmError`
pub(crate) fn error_for_transport(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::NetworkError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let auth = error_for_status(reqwest::StatusCode::UNAUTHORIZED, "no".into());
        assert!(matches!(auth, LlmError::AuthenticationFailed(_)));

        let limited = error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "".into());
        assert!(matches!(limited, LlmError::RateLimitExceeded));

        let down = error_for_status(reqwest::StatusCode::BAD_GATEWAY, "".into());
        assert!(matches!(down, LlmError::ProviderUnavailable(_)));

        let bad = error_for_status(reqwest::StatusCode::BAD_REQUEST, "".into());
        assert!(matches!(bad, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_llm_error_surfaces_as_inference_error() {
        let core: CoreError = LlmError::Timeout.into();
        assert!(matches!(core, CoreError::InferenceError(_)));
    }
}
