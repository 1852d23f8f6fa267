use crate::application_port::AuthError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait SessionAuthority: Send + Sync {
    /// Mint an access/refresh pair and register both in the subject's session set.
    async fn issue(&self, subject: &Subject) -> Result<AuthTokens, AuthError>;

    /// Signature and expiry, then blacklist, then session membership.
    async fn validate(&self, token: &str, expected: TokenClass) -> Result<Subject, AuthError>;

    /// Validate and consume in one step; a second redemption of the same
    /// token fails even under concurrency.
    async fn redeem(&self, token: &str, expected: TokenClass) -> Result<Subject, AuthError>;

    /// Blacklist one token for the rest of its lifetime. Expired tokens are a no-op.
    async fn invalidate(&self, token: &str) -> Result<(), AuthError>;

    async fn invalidate_all(&self, subject: &Subject) -> Result<(), AuthError>;
}
