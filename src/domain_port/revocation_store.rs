use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub signature: TokenSignature,
    pub ttl: Duration,
}

/// Snapshot of a rate-limit counter right after an increment.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AttemptWindow {
    pub count: u64,
    pub resets_in: Duration,
}

/// Key-value store behind revocation. Every call touches a single key and
/// is atomic on its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    async fn blacklist(&self, signature: &TokenSignature, ttl: Duration)
    -> Result<(), StoreError>;

    async fn is_blacklisted(&self, signature: &TokenSignature) -> Result<bool, StoreError>;

    /// Add entries to the subject's session set. The set TTL grows to the
    /// longest entry and never shrinks.
    async fn add_to_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
    ) -> Result<(), StoreError>;

    /// Drop every member of the session set, then add `entries`, in one call.
    async fn replace_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
    ) -> Result<(), StoreError>;

    async fn is_in_session(
        &self,
        subject: &Subject,
        signature: &TokenSignature,
    ) -> Result<bool, StoreError>;

    /// Returns `true` only for the caller that actually removed the member.
    async fn remove_from_session(
        &self,
        subject: &Subject,
        signature: &TokenSignature,
    ) -> Result<bool, StoreError>;

    async fn clear_sessions(&self, subject: &Subject) -> Result<(), StoreError>;

    async fn put_code(&self, key: &CodeKey, hashed_code: &str, ttl: Duration)
    -> Result<(), StoreError>;

    async fn get_code(&self, key: &CodeKey) -> Result<Option<String>, StoreError>;

    /// Returns `true` only for the caller that actually deleted the code.
    async fn delete_code(&self, key: &CodeKey) -> Result<bool, StoreError>;

    /// The first increment on a fresh counter starts the window; later
    /// increments inside the window leave its expiry alone.
    async fn increment_attempts(
        &self,
        key: &CodeKey,
        window: Duration,
    ) -> Result<AttemptWindow, StoreError>;

    async fn clear_attempts(&self, key: &CodeKey) -> Result<(), StoreError>;
}
