use super::{error_for_status, error_for_transport, LlmError, TextGenerator};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Messages-API client for Anthropic
pub struct AnthropicGenerator {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicGenerator {
    pub fn new(config: LlmConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            api_key,
            client,
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> super::Result<String> {
        let url = format!("{}/messages", self.config.base_url);

        let payload = json!({
            "model": self.config.model,
            "max_tokens": max_output_tokens,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": user_prompt },
            ],
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(error_for_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content_arr = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LlmError::ParseError("No content array in response".to_string()))?;

        let mut full_content = String::new();
        for item in content_arr {
            if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                full_content.push_str(text);
            }
        }

        Ok(full_content)
    }
}
