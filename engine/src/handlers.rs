//! Command handlers for CLI operations
//!
//! Each handler drives the gateway the way a remote front-end would and
//! renders the result as text or JSON.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

use crate::gateway::{Gateway, RateLimitIdentity};
use sdk::types::DigestMode;

/// Credential presented by the local CLI user; the bundled `LocalUser`
/// access control accepts anything and maps it to one local account.
pub const LOCAL_CREDENTIAL: &str = "local";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Upload a lecture text file and print the minted key
pub async fn handle_ingest(gateway: &Gateway, file: &Path, format: OutputFormat) -> Result<()> {
    let raw_text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let lecture_key = gateway.store_lecture(LOCAL_CREDENTIAL, raw_text).await?;

    match format {
        OutputFormat::Text => println!("{}", lecture_key),
        OutputFormat::Json => println!("{}", json!({ "lecture_key": lecture_key })),
    }
    Ok(())
}

/// One chat turn against a lecture
pub async fn handle_chat(
    gateway: &Gateway,
    lecture_key: &str,
    message: String,
    format: OutputFormat,
) -> Result<()> {
    let response = gateway.chat(LOCAL_CREDENTIAL, lecture_key, message).await?;

    match format {
        OutputFormat::Text => println!("{}", response),
        OutputFormat::Json => println!("{}", json!({ "response": response })),
    }
    Ok(())
}

/// Summarize or extract concepts from a lecture
pub async fn handle_digest(
    gateway: &Gateway,
    lecture_key: &str,
    mode: DigestMode,
    format: OutputFormat,
) -> Result<()> {
    let output = gateway.digest(LOCAL_CREDENTIAL, lecture_key, mode).await?;

    match format {
        OutputFormat::Text => println!("{}", output),
        OutputFormat::Json => println!("{}", json!({ "mode": mode.to_string(), "output": output })),
    }
    Ok(())
}

/// Print the stored raw text of a lecture
pub async fn handle_raw(gateway: &Gateway, lecture_key: &str, format: OutputFormat) -> Result<()> {
    let raw_text = gateway.raw_text(LOCAL_CREDENTIAL, lecture_key).await?;

    match format {
        OutputFormat::Text => println!("{}", raw_text),
        OutputFormat::Json => println!("{}", json!({ "raw_text": raw_text })),
    }
    Ok(())
}

/// Show the chat history of a lecture
pub async fn handle_history(
    gateway: &Gateway,
    lecture_key: &str,
    format: OutputFormat,
) -> Result<()> {
    let history = gateway.history(LOCAL_CREDENTIAL, lecture_key).await?;

    match format {
        OutputFormat::Text => {
            if history.is_empty() {
                println!("(no messages)");
            }
            for message in &history {
                let when = chrono::DateTime::from_timestamp_millis(message.timestamp_ms)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| message.timestamp_ms.to_string());
                println!("[{}] {}: {}", when, message.role, message.content);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
    }
    Ok(())
}

/// Show the current rate-limit window for an identifier and endpoint
pub async fn handle_limits_show(
    gateway: &Gateway,
    identifier: &str,
    endpoint: &str,
    format: OutputFormat,
) -> Result<()> {
    let identity = parse_identity(identifier)?;
    let decision = gateway.preview_limit(&identity, endpoint).await?;

    match format {
        OutputFormat::Text => {
            println!(
                "{} {}: allowed={} remaining={}/{} resets at {}",
                identity, endpoint, decision.allowed, decision.remaining, decision.limit,
                decision.reset_at_ms
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decision)?),
    }
    Ok(())
}

/// Reset stored rate-limit windows for an identifier
pub async fn handle_limits_reset(
    gateway: &Gateway,
    identifier: &str,
    endpoint: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let identity = parse_identity(identifier)?;
    gateway.reset_limits(&identity, endpoint).await?;

    match format {
        OutputFormat::Text => match endpoint {
            Some(endpoint) => println!("Reset {} for {}", endpoint, identity),
            None => println!("Reset all endpoints for {}", identity),
        },
        OutputFormat::Json => println!("{}", json!({ "reset": true })),
    }
    Ok(())
}

/// Parse a namespaced identifier (`user:<id>` or `ip:<addr>`)
fn parse_identity(identifier: &str) -> Result<RateLimitIdentity> {
    if let Some(id) = identifier.strip_prefix("user:") {
        Ok(RateLimitIdentity::User(id.to_string()))
    } else if let Some(addr) = identifier.strip_prefix("ip:") {
        Ok(RateLimitIdentity::Ip(addr.to_string()))
    } else {
        anyhow::bail!(
            "Identifier must be namespaced as user:<id> or ip:<addr>, got {}",
            identifier
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        assert_eq!(
            parse_identity("user:alice").unwrap(),
            RateLimitIdentity::User("alice".to_string())
        );
        assert_eq!(
            parse_identity("ip:10.0.0.1").unwrap(),
            RateLimitIdentity::Ip("10.0.0.1".to_string())
        );
        assert!(parse_identity("alice").is_err());
    }
}
