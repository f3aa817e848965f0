use super::{error_for_status, error_for_transport, LlmError, TextGenerator};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Chat-completions client for OpenAI and OpenAI-compatible endpoints
pub struct OpenAiGenerator {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
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
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> super::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let payload = json!({
            "model": self.config.model,
            "max_tokens": max_output_tokens,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let content = data
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| LlmError::ParseError("No message content in response".to_string()))?;

        Ok(content.to_string())
    }
}
