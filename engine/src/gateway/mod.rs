//! Gateway dispatcher
//!
//! Front door of the core: resolves each inbound operation to an actor
//! key, enforces rate limits, and relays the actor's response under a
//! wall-clock timeout.
//!
//! Failure policy is asymmetric on purpose: a limiter that cannot be
//! reached fails OPEN (availability over strict enforcement, logged),
//! while lecture-actor failures fail CLOSED. A dispatch timeout is a
//! transient failure: the actor may still complete and persist its write
//! after the caller gave up, and the next call against that key observes
//! whatever was persisted.

use crate::actor::ActorRuntime;
use crate::config::Config;
use crate::db::lectures::LectureStore;
use crate::db::windows::WindowStore;
use crate::db::Database;
use crate::lecture::{LectureActor, LectureReply, LectureRequest};
use crate::limiter::{LimiterReply, LimiterRequest, RateLimiterActor};
use crate::llm::TextGenerator;
use sdk::access::{AccessControl, UserId};
use sdk::errors::CoreError;
use sdk::types::{ChatMessage, DigestMode, RateLimitDecision};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Namespaced rate-limit identifier
///
/// User ids and IP addresses live in disjoint namespaces so an id can
/// never collide with an address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitIdentity {
    User(String),
    Ip(String),
}

impl RateLimitIdentity {
    /// The actor key this identity maps to
    pub fn actor_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RateLimitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitIdentity::User(id) => write!(f, "user:{}", id),
            RateLimitIdentity::Ip(addr) => write!(f, "ip:{}", addr),
        }
    }
}

/// Gateway over the limiter and lecture actor runtimes
pub struct Gateway {
    limiters: Arc<ActorRuntime<RateLimiterActor>>,
    lectures: Arc<ActorRuntime<LectureActor>>,
    access: Arc<dyn AccessControl>,
    dispatch_timeout: Duration,
}

impl Gateway {
    /// Build the gateway and its actor runtimes from shared components
    pub fn new(
        db: &Database,
        config: &Config,
        generator: Arc<dyn TextGenerator>,
        access: Arc<dyn AccessControl>,
    ) -> Arc<Self> {
        let pool = db.pool().clone();
        let policies = Arc::new(config.limits.clone());

        let limiter_pool = pool.clone();
        let limiters = ActorRuntime::new(move |key| {
            RateLimiterActor::new(
                key,
                WindowStore::new(limiter_pool.clone()),
                Arc::clone(&policies),
            )
        });

        let chunk_budget = config.pipeline.chunk_budget_chars;
        let max_output_tokens = config.llm.max_output_tokens;
        let lectures = ActorRuntime::new(move |key| {
            LectureActor::new(
                key,
                LectureStore::new(pool.clone()),
                Arc::clone(&generator),
                chunk_budget,
                max_output_tokens,
            )
        });

        Self::from_parts(
            limiters,
            lectures,
            access,
            Duration::from_secs(config.gateway.dispatch_timeout_secs),
        )
    }

    /// Assemble a gateway from prebuilt runtimes (embedding and tests)
    pub fn from_parts(
        limiters: Arc<ActorRuntime<RateLimiterActor>>,
        lectures: Arc<ActorRuntime<LectureActor>>,
        access: Arc<dyn AccessControl>,
        dispatch_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            limiters,
            lectures,
            access,
            dispatch_timeout,
        })
    }

    /// Store uploaded lecture text under a freshly minted key
    ///
    /// One upload = one new key; the key is returned to the caller and is
    /// the handle for every later operation on this lecture.
    pub async fn store_lecture(
        &self,
        credential: &str,
        raw_text: String,
    ) -> Result<String, CoreError> {
        let user = self.authorize(credential, None).await?;
        self.enforce_limit(&RateLimitIdentity::User(user), "upload")
            .await?;

        let lecture_key = format!("lecture:{}", Uuid::new_v4());
        self.dispatch_lecture(&lecture_key, LectureRequest::StoreLecture { raw_text })
            .await?;
        info!("Stored new lecture under {}", lecture_key);
        Ok(lecture_key)
    }

    /// One chat turn against a lecture's history
    pub async fn chat(
        &self,
        credential: &str,
        lecture_key: &str,
        message: String,
    ) -> Result<String, CoreError> {
        let user = self.authorize(credential, Some(lecture_key)).await?;
        self.enforce_limit(&RateLimitIdentity::User(user), "chat")
            .await?;

        match self
            .dispatch_lecture(lecture_key, LectureRequest::Chat { message })
            .await?
        {
            LectureReply::ChatResponse(response) => Ok(response),
            _ => Err(CoreError::MailboxClosed),
        }
    }

    /// Fetch the stored raw text of a lecture
    pub async fn raw_text(
        &self,
        credential: &str,
        lecture_key: &str,
    ) -> Result<String, CoreError> {
        self.authorize(credential, Some(lecture_key)).await?;

        match self
            .dispatch_lecture(lecture_key, LectureRequest::GetRawText)
            .await?
        {
            LectureReply::RawText(text) => Ok(text),
            _ => Err(CoreError::MailboxClosed),
        }
    }

    /// Fetch the full chat history of a lecture
    pub async fn history(
        &self,
        credential: &str,
        lecture_key: &str,
    ) -> Result<Vec<ChatMessage>, CoreError> {
        self.authorize(credential, Some(lecture_key)).await?;

        match self
            .dispatch_lecture(lecture_key, LectureRequest::GetHistory)
            .await?
        {
            LectureReply::History(history) => Ok(history),
            _ => Err(CoreError::MailboxClosed),
        }
    }

    /// Summarize or extract concepts from a lecture via the chunked pipeline
    pub async fn digest(
        &self,
        credential: &str,
        lecture_key: &str,
        mode: DigestMode,
    ) -> Result<String, CoreError> {
        let user = self.authorize(credential, Some(lecture_key)).await?;
        self.enforce_limit(&RateLimitIdentity::User(user), &mode.to_string())
            .await?;

        match self
            .dispatch_lecture(lecture_key, LectureRequest::Digest { mode })
            .await?
        {
            LectureReply::Digest(output) => Ok(output),
            _ => Err(CoreError::MailboxClosed),
        }
    }

    /// Read-only rate-limit preview for an identity and endpoint
    pub async fn preview_limit(
        &self,
        identity: &RateLimitIdentity,
        endpoint: &str,
    ) -> Result<RateLimitDecision, CoreError> {
        match self
            .dispatch_limiter(
                identity,
                LimiterRequest::Check {
                    endpoint: endpoint.to_string(),
                },
            )
            .await?
        {
            LimiterReply::Decision(decision) => Ok(decision),
            LimiterReply::Reset => Err(CoreError::MailboxClosed),
        }
    }

    /// Administrative reset of stored windows for an identity
    pub async fn reset_limits(
        &self,
        identity: &RateLimitIdentity,
        endpoint: Option<&str>,
    ) -> Result<(), CoreError> {
        let request = match endpoint {
            Some(endpoint) => LimiterRequest::Reset {
                endpoint: endpoint.to_string(),
            },
            None => LimiterRequest::ResetAll,
        };
        self.dispatch_limiter(identity, request).await?;
        Ok(())
    }

    async fn authorize(
        &self,
        credential: &str,
        lecture_key: Option<&str>,
    ) -> Result<UserId, CoreError> {
        let user = self
            .access
            .authenticate(credential)
            .await
            .ok_or(CoreError::Forbidden)?;
        if let Some(key) = lecture_key {
            if !self.access.authorize_ownership(&user, key).await {
                return Err(CoreError::Forbidden);
            }
        }
        Ok(user)
    }

    /// Count this request against the identity's window for `endpoint`
    ///
    /// Denial surfaces as `RateLimited` with retry metadata. Any limiter
    /// failure (storage down, mailbox gone, timeout) fails open: an
    /// internal outage must not block all traffic.
    async fn enforce_limit(
        &self,
        identity: &RateLimitIdentity,
        endpoint: &str,
    ) -> Result<(), CoreError> {
        let request = LimiterRequest::CheckAndIncrement {
            endpoint: endpoint.to_string(),
        };
        match self.dispatch_limiter(identity, request).await {
            Ok(LimiterReply::Decision(decision)) if !decision.allowed => {
                Err(CoreError::RateLimited {
                    limit: decision.limit,
                    retry_after_secs: decision.retry_after_secs,
                    reset_at_ms: decision.reset_at_ms,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(
                    "Rate limiter unavailable for {} on {}; failing open: {}",
                    identity, endpoint, e
                );
                Ok(())
            }
        }
    }

    async fn dispatch_limiter(
        &self,
        identity: &RateLimitIdentity,
        request: LimiterRequest,
    ) -> Result<LimiterReply, CoreError> {
        let key = identity.actor_key();
        match timeout(self.dispatch_timeout, self.limiters.dispatch(&key, request)).await {
            Ok(result) => result?,
            Err(_) => Err(CoreError::DispatchTimeout),
        }
    }

    async fn dispatch_lecture(
        &self,
        lecture_key: &str,
        request: LectureRequest,
    ) -> Result<LectureReply, CoreError> {
        match timeout(
            self.dispatch_timeout,
            self.lectures.dispatch(lecture_key, request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => Err(CoreError::DispatchTimeout),
        }
    }
}
