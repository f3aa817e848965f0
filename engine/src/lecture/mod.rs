//! Lecture memory actor
//!
//! Owns one lecture's raw text and append-only chat history, keyed by the
//! lecture actor key. Chat replies are grounded in the full conversation
//! history. The user's message is persisted BEFORE the inference call and
//! is never rolled back: a failed turn loses the reply, not the question.
//!
//! Summarize/extract operations hand the stored raw text to the chunked
//! digest pipeline.

use crate::actor::Actor;
use crate::db::lectures::LectureStore;
use crate::llm::TextGenerator;
use crate::pipeline::DigestPipeline;
use sdk::errors::CoreError;
use sdk::types::{ChatMessage, DigestMode};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Grounding instruction prepended to every chat inference call
const CHAT_SYSTEM_PROMPT: &str = "You are a study assistant. Answer strictly \
    from the conversation history and lecture context below; do not bring in \
    outside knowledge. Be concise.";

/// Operations accepted by a lecture actor
#[derive(Debug, Clone)]
pub enum LectureRequest {
    /// Set the raw text for this key (idempotent overwrite)
    StoreLecture { raw_text: String },

    /// One conversational turn grounded in this key's history
    Chat { message: String },

    /// Fetch the stored raw text
    GetRawText,

    /// Fetch the full chat history
    GetHistory,

    /// Run the digest pipeline over the stored raw text
    Digest { mode: DigestMode },
}

/// Reply from a lecture actor
#[derive(Debug, Clone)]
pub enum LectureReply {
    Stored,
    ChatResponse(String),
    RawText(String),
    History(Vec<ChatMessage>),
    Digest(String),
}

/// Per-key lecture memory actor
pub struct LectureActor {
    key: String,
    store: LectureStore,
    generator: Arc<dyn TextGenerator>,
    pipeline: DigestPipeline,
    max_output_tokens: u32,
}

impl LectureActor {
    pub fn new(
        key: impl Into<String>,
        store: LectureStore,
        generator: Arc<dyn TextGenerator>,
        chunk_budget_chars: usize,
        max_output_tokens: u32,
    ) -> Self {
        let pipeline = DigestPipeline::new(
            Arc::clone(&generator),
            chunk_budget_chars,
            max_output_tokens,
        );
        Self {
            key: key.into(),
            store,
            generator,
            pipeline,
            max_output_tokens,
        }
    }

    async fn store_lecture(&self, raw_text: &str) -> Result<LectureReply, CoreError> {
        if raw_text.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "lecture text is empty".to_string(),
            ));
        }
        self.store
            .upsert_raw_text(&self.key, raw_text, now_ms())
            .await?;
        debug!("Stored {} chars of lecture text for {}", raw_text.len(), self.key);
        Ok(LectureReply::Stored)
    }

    async fn chat(&self, message: &str) -> Result<LectureReply, CoreError> {
        // Persist the user's turn before any inference: conversational
        // state survives a failed reply.
        let user_turn = ChatMessage::user(message, now_ms());
        self.store.append_message(&self.key, &user_turn).await?;

        let history = self.store.history(&self.key).await?;
        let transcript = render_history(&history);

        let response = match self
            .generator
            .generate(CHAT_SYSTEM_PROMPT, &transcript, self.max_output_tokens)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Chat inference failed for {}: {}", self.key, e);
                return Err(e.into());
            }
        };

        let assistant_turn = ChatMessage::assistant(&response, now_ms());
        self.store.append_message(&self.key, &assistant_turn).await?;

        Ok(LectureReply::ChatResponse(response))
    }

    async fn raw_text(&self) -> Result<String, CoreError> {
        let lecture = self.store.load(&self.key).await?.ok_or(CoreError::NotFound)?;
        Ok(lecture.raw_text)
    }

    async fn digest(&self, mode: DigestMode) -> Result<LectureReply, CoreError> {
        let raw_text = self.raw_text().await?;
        let output = self.pipeline.run(&raw_text, mode).await?;
        Ok(LectureReply::Digest(output))
    }
}

#[async_trait::async_trait]
impl Actor for LectureActor {
    type Request = LectureRequest;
    type Response = Result<LectureReply, CoreError>;

    async fn handle(&mut self, request: LectureRequest) -> Self::Response {
        match request {
            LectureRequest::StoreLecture { raw_text } => self.store_lecture(&raw_text).await,
            LectureRequest::Chat { message } => self.chat(&message).await,
            LectureRequest::GetRawText => self.raw_text().await.map(LectureReply::RawText),
            LectureRequest::GetHistory => {
                let history = self.store.history(&self.key).await?;
                Ok(LectureReply::History(history))
            }
            LectureRequest::Digest { mode } => self.digest(mode).await,
        }
    }
}

/// Render history as a plain transcript, oldest first
fn render_history(history: &[ChatMessage]) -> String {
    let mut transcript = String::new();
    for message in history {
        transcript.push_str(&format!("{}: {}\n", message.role, message.content));
    }
    transcript
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
