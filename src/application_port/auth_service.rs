use crate::application_port::AuthTokens;
use crate::domain_model::*;
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a bearer token was refused. Kept for logs only; callers see a single
/// opaque `InvalidToken`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TokenRejection {
    InvalidSignature,
    Expired,
    Malformed,
    WrongClass,
    Blacklisted,
    SessionNotFound,
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenRejection::InvalidSignature => "invalid signature",
            TokenRejection::Expired => "expired",
            TokenRejection::Malformed => "malformed",
            TokenRejection::WrongClass => "wrong token class",
            TokenRejection::Blacklisted => "blacklisted",
            TokenRejection::SessionNotFound => "not in session set",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken(TokenRejection),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("email registered but not yet verified")]
    VerificationPending,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email not verified")]
    EmailNotVerified,
    #[error("email already verified")]
    AlreadyVerified,
    #[error("invalid code")]
    InvalidCode,
    #[error("code expired")]
    CodeExpired,
    #[error("resend limit exceeded, retry after {retry_after}")]
    ResendLimitExceeded { retry_after: DateTime<Utc> },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("repository error: {0}")]
    Repository(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub principal_id: PrincipalId,
    pub subject: Subject,
    pub state: AccountState,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct VerifyEmailInput {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct ResetPasswordInput {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub email: String,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub principal_id: PrincipalId,
    pub subject: Subject,
    pub tokens: AuthTokens,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

/// Account lifecycle: `UNREGISTERED -> PENDING_VERIFICATION -> ACTIVE`, plus
/// the session transitions that hang off it.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<RegisterOutcome, AuthError>;
    async fn verify_email(&self, request: VerifyEmailInput) -> Result<LoginResult, AuthError>;
    /// Returns the number of resends left in the current window.
    async fn resend_verification_code(&self, email: &str) -> Result<u64, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;
    async fn reset_password(&self, request: ResetPasswordInput) -> Result<(), AuthError>;
    async fn change_password(&self, request: ChangePasswordInput) -> Result<(), AuthError>;
}
