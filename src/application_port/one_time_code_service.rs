use crate::application_port::AuthError;
use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CodeCheck {
    Valid,
    Invalid,
    Missing,
}

#[async_trait::async_trait]
pub trait OneTimeCodeService: Send + Sync {
    fn generate_code(&self, namespace: CodeNamespace) -> String;

    /// Store the hash of `plain_code`; the plaintext never reaches the store.
    async fn store_code(&self, key: &CodeKey, plain_code: &str, ttl: Duration)
    -> Result<(), AuthError>;

    /// A `Valid` result consumes the code.
    async fn check_code(&self, key: &CodeKey, provided: &str) -> Result<CodeCheck, AuthError>;

    /// Count one send against the window. Returns sends left, or
    /// `ResendLimitExceeded` once `max_attempts` is passed.
    async fn rate_limited_resend(
        &self,
        key: &CodeKey,
        max_attempts: u64,
        window: Duration,
    ) -> Result<u64, AuthError>;

    /// Best effort: failures are logged, not returned.
    async fn clear_attempts(&self, key: &CodeKey);
}
