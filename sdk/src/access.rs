//! Access-control boundary
//!
//! Authentication and ownership checks belong to the excluded session/DB
//! layer. The gateway consumes them through these traits so that the core
//! never depends on a concrete credential store. The core trusts the
//! decisions made here and takes no independent action on ownership.

use async_trait::async_trait;

/// Opaque user identifier issued by the session layer
pub type UserId = String;

/// Authentication and ownership decisions, made outside the core
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Resolve a bearer credential to a user id, or `None` if unauthorized
    async fn authenticate(&self, credential: &str) -> Option<UserId>;

    /// Whether `user_id` owns the lecture stored under `lecture_key`
    async fn authorize_ownership(&self, user_id: &str, lecture_key: &str) -> bool;
}

/// Single-user access control for local front-ends (the CLI)
///
/// Authenticates every credential as one fixed local user and grants
/// ownership of every lecture key.
pub struct LocalUser {
    user_id: UserId,
}

impl LocalUser {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl Default for LocalUser {
    fn default() -> Self {
        Self::new("local")
    }
}

#[async_trait]
impl AccessControl for LocalUser {
    async fn authenticate(&self, _credential: &str) -> Option<UserId> {
        Some(self.user_id.clone())
    }

    async fn authorize_ownership(&self, _user_id: &str, _lecture_key: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_user_authenticates_everything() {
        let access = LocalUser::default();
        assert_eq!(access.authenticate("anything").await.as_deref(), Some("local"));
        assert!(access.authorize_ownership("local", "lecture:abc").await);
    }
}
