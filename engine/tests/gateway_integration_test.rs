//! End-to-end tests through the gateway dispatcher
//!
//! Upload → chat → digest against a real SQLite store with a scripted
//! inference collaborator, plus the dispatch-timeout path.

use async_trait::async_trait;
use lectern_engine::config::Config;
use lectern_engine::db::Database;
use lectern_engine::gateway::{Gateway, RateLimitIdentity};
use lectern_engine::llm::{LlmError, TextGenerator};
use sdk::access::LocalUser;
use sdk::errors::CoreError;
use sdk::types::{DigestMode, MessageRole, RateLimitPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct SlowGenerator {
    reply: String,
    delay: Duration,
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _max_output_tokens: u32,
    ) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}

fn config_with(dispatch_timeout_secs: u64) -> Config {
    let mut config = Config::default();
    config.gateway.dispatch_timeout_secs = dispatch_timeout_secs;
    config.limits = HashMap::from([
        ("upload".to_string(), RateLimitPolicy::new(10, 60)),
        ("chat".to_string(), RateLimitPolicy::new(10, 60)),
        ("summarize".to_string(), RateLimitPolicy::new(5, 60)),
        ("extract".to_string(), RateLimitPolicy::new(5, 60)),
    ]);
    config
}

async fn setup(
    reply: &str,
    delay: Duration,
    dispatch_timeout_secs: u64,
) -> (TempDir, Database, Arc<Gateway>) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    let gateway = Gateway::new(
        &db,
        &config_with(dispatch_timeout_secs),
        Arc::new(SlowGenerator {
            reply: reply.to_string(),
            delay,
        }),
        Arc::new(LocalUser::default()),
    );
    (temp_dir, db, gateway)
}

#[tokio::test]
async fn test_full_study_session() {
    let (_temp_dir, db, gateway) = setup("## Notes", Duration::ZERO, 30).await;

    let key = gateway
        .store_lecture("token", "the krebs cycle in detail".to_string())
        .await
        .unwrap();

    let summary = gateway
        .digest("token", &key, DigestMode::Summarize)
        .await
        .unwrap();
    assert_eq!(summary, "## Notes");

    let concepts = gateway
        .digest("token", &key, DigestMode::Extract)
        .await
        .unwrap();
    assert_eq!(concepts, "## Notes");

    gateway
        .chat("token", &key, "explain the first step".to_string())
        .await
        .unwrap();
    gateway
        .chat("token", &key, "and the second?".to_string())
        .await
        .unwrap();

    let history = gateway.history("token", &key).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "explain the first step");

    // Digest operations leave history untouched
    let raw = gateway.raw_text("token", &key).await.unwrap();
    assert_eq!(raw, "the krebs cycle in detail");

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_upload_rejected() {
    let (_temp_dir, _db, gateway) = setup("ok", Duration::ZERO, 30).await;

    let err = gateway
        .store_lecture("token", "   ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_operations_on_unknown_lecture() {
    let (_temp_dir, _db, gateway) = setup("ok", Duration::ZERO, 30).await;

    let err = gateway
        .raw_text("token", "lecture:nonexistent")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound));

    let err = gateway
        .digest("token", "lecture:nonexistent", DigestMode::Summarize)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[tokio::test]
async fn test_slow_inference_times_out_but_user_turn_persists() {
    // 1s dispatch timeout against a 3s inference call
    let (_temp_dir, db, gateway) = setup("late reply", Duration::from_secs(3), 1).await;

    let key = gateway
        .store_lecture("token", "thermodynamics".to_string())
        .await
        .unwrap();

    let err = gateway
        .chat("token", &key, "what is entropy?".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DispatchTimeout));

    // The actor persisted the user turn before the caller gave up; the
    // in-flight work was abandoned, not cancelled, so the assistant turn
    // lands once the call completes.
    let history = db.lectures().history(&key).await.unwrap();
    assert!(!history.is_empty());
    assert_eq!(history[0].role, MessageRole::User);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let history = db.lectures().history(&key).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn test_digest_limit_uses_mode_endpoint() {
    let (_temp_dir, _db, gateway) = setup("ok", Duration::ZERO, 30).await;

    let key = gateway
        .store_lecture("token", "a lecture".to_string())
        .await
        .unwrap();

    for _ in 0..5 {
        gateway
            .digest("token", &key, DigestMode::Summarize)
            .await
            .unwrap();
    }
    let err = gateway
        .digest("token", &key, DigestMode::Summarize)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RateLimited { .. }));

    // extract has its own window
    gateway
        .digest("token", &key, DigestMode::Extract)
        .await
        .unwrap();

    let preview = gateway
        .preview_limit(&RateLimitIdentity::User("local".to_string()), "extract")
        .await
        .unwrap();
    assert_eq!(preview.remaining, 4);
}
