//! Integration tests for the lecture memory actor
//!
//! Drives lecture actors through the actor runtime and verifies the
//! append-only history guarantees: 2k growth for k successful turns,
//! user-only persistence on inference failure, and full-history grounding.

use async_trait::async_trait;
use lectern_engine::actor::ActorRuntime;
use lectern_engine::db::lectures::LectureStore;
use lectern_engine::db::Database;
use lectern_engine::lecture::{LectureActor, LectureReply, LectureRequest};
use lectern_engine::llm::{LlmError, TextGenerator};
use sdk::errors::CoreError;
use sdk::types::MessageRole;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Scripted collaborator: records prompts, optionally fails on demand
struct FlakyGenerator {
    prompts: Mutex<Vec<String>>,
    fail_next: AtomicBool,
}

impl FlakyGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        })
    }

    fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for FlakyGenerator {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _max_output_tokens: u32,
    ) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LlmError::ProviderUnavailable("down".to_string()));
        }
        Ok("scripted reply".to_string())
    }
}

async fn setup(
    generator: Arc<FlakyGenerator>,
) -> (TempDir, Database, Arc<ActorRuntime<LectureActor>>) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    let pool = db.pool().clone();
    let runtime = ActorRuntime::new(move |key| {
        LectureActor::new(
            key,
            LectureStore::new(pool.clone()),
            Arc::clone(&generator) as _,
            12_000,
            256,
        )
    });
    (temp_dir, db, runtime)
}

async fn chat(
    runtime: &ActorRuntime<LectureActor>,
    key: &str,
    message: &str,
) -> Result<String, CoreError> {
    match runtime
        .dispatch(
            key,
            LectureRequest::Chat {
                message: message.to_string(),
            },
        )
        .await?
    {
        Ok(LectureReply::ChatResponse(response)) => Ok(response),
        Ok(other) => panic!("expected chat response, got {:?}", other),
        Err(e) => Err(e),
    }
}

#[tokio::test]
async fn test_history_grows_by_two_per_successful_turn() {
    let generator = FlakyGenerator::new();
    let (_temp_dir, db, runtime) = setup(Arc::clone(&generator)).await;

    for k in 1..=3 {
        chat(&runtime, "lecture:abc", &format!("question {}", k))
            .await
            .unwrap();
        let history = db.lectures().history("lecture:abc").await.unwrap();
        assert_eq!(history.len(), 2 * k);
    }

    let history = db.lectures().history("lecture:abc").await.unwrap();
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, MessageRole::User);
        assert_eq!(pair[1].role, MessageRole::Assistant);
    }
}

#[tokio::test]
async fn test_failed_turn_appends_only_the_user_message() {
    let generator = FlakyGenerator::new();
    let (_temp_dir, db, runtime) = setup(Arc::clone(&generator)).await;

    chat(&runtime, "lecture:abc", "first").await.unwrap();

    generator.fail_next();
    let err = chat(&runtime, "lecture:abc", "second").await;
    assert!(matches!(err, Err(CoreError::InferenceError(_))));

    // 2 from the successful turn + 1 user-only from the failed turn
    let history = db.lectures().history("lecture:abc").await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].role, MessageRole::User);
    assert_eq!(history[2].content, "second");

    // The next successful turn still sees the orphaned user message
    chat(&runtime, "lecture:abc", "third").await.unwrap();
    let prompt = generator.last_prompt();
    assert!(prompt.contains("second"));
}

#[tokio::test]
async fn test_second_turn_grounded_in_first() {
    let generator = FlakyGenerator::new();
    let (_temp_dir, _db, runtime) = setup(Arc::clone(&generator)).await;

    chat(&runtime, "lecture:abc", "what is osmosis?")
        .await
        .unwrap();
    chat(&runtime, "lecture:abc", "and diffusion?")
        .await
        .unwrap();

    let prompt = generator.last_prompt();
    assert!(prompt.contains("user: what is osmosis?"));
    assert!(prompt.contains("assistant: scripted reply"));
    assert!(prompt.contains("user: and diffusion?"));
}

#[tokio::test]
async fn test_histories_are_isolated_between_keys() {
    let generator = FlakyGenerator::new();
    let (_temp_dir, db, runtime) = setup(Arc::clone(&generator)).await;

    chat(&runtime, "lecture:a", "about a").await.unwrap();
    chat(&runtime, "lecture:b", "about b").await.unwrap();

    let a = db.lectures().history("lecture:a").await.unwrap();
    let b = db.lectures().history("lecture:b").await.unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 2);
    assert_eq!(a[0].content, "about a");
    assert_eq!(b[0].content, "about b");
}

#[tokio::test]
async fn test_history_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let generator = FlakyGenerator::new();

    {
        let db = Database::new(&db_path).await.unwrap();
        let pool = db.pool().clone();
        let generator = Arc::clone(&generator);
        let runtime = ActorRuntime::new(move |key| {
            LectureActor::new(
                key,
                LectureStore::new(pool.clone()),
                Arc::clone(&generator) as _,
                12_000,
                256,
            )
        });
        runtime
            .dispatch(
                "lecture:abc",
                LectureRequest::StoreLecture {
                    raw_text: "enzyme kinetics".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        chat(&runtime, "lecture:abc", "what are enzymes?")
            .await
            .unwrap();
        db.close().await.unwrap();
    }

    let db = Database::new(&db_path).await.unwrap();
    let pool = db.pool().clone();
    let runtime = ActorRuntime::new(move |key| {
        LectureActor::new(
            key,
            LectureStore::new(pool.clone()),
            Arc::clone(&generator) as _,
            12_000,
            256,
        )
    });

    let reply = runtime
        .dispatch("lecture:abc", LectureRequest::GetRawText)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reply, LectureReply::RawText(t) if t == "enzyme kinetics"));

    let reply = runtime
        .dispatch("lecture:abc", LectureRequest::GetHistory)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reply, LectureReply::History(h) if h.len() == 2));
}
