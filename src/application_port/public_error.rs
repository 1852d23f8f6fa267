use crate::application_port::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// What a caller outside the service gets to see. Token and store details
/// are logged here and never forwarded.
#[derive(Debug, Clone, Eq, PartialEq, Error, Serialize)]
#[serde(tag = "code")]
pub enum PublicError {
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Please verify your email address before logging in")]
    EmailNotVerified,
    #[error("This email address is already registered")]
    DuplicateEmail,
    #[error("This username is already taken")]
    DuplicateUsername,
    #[error("This email is registered but not verified; request a new code")]
    VerificationPending,
    #[error("This email is already verified")]
    AlreadyVerified,
    #[error("Invalid code")]
    InvalidCode,
    #[error("The code has expired, request a new one")]
    CodeExpired,
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
    #[error("Too many attempts, retry after {retry_after}")]
    RetryLater { retry_after: DateTime<Utc> },
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl PublicError {
    fn unavailable<E: std::fmt::Display>(error: E) -> PublicError {
        warn!(%error, "store unavailable");
        PublicError::ServiceUnavailable
    }

    fn internal<E: std::fmt::Display>(error: E) -> PublicError {
        warn!(%error, "internal error");
        PublicError::InternalError
    }
}

impl From<AuthError> for PublicError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidToken(reason) => {
                warn!(%reason, "token rejected");
                PublicError::InvalidToken
            }
            AuthError::DuplicateEmail => PublicError::DuplicateEmail,
            AuthError::DuplicateUsername => PublicError::DuplicateUsername,
            AuthError::VerificationPending => PublicError::VerificationPending,
            AuthError::InvalidCredentials => PublicError::InvalidCredentials,
            AuthError::EmailNotVerified => PublicError::EmailNotVerified,
            AuthError::AlreadyVerified => PublicError::AlreadyVerified,
            AuthError::InvalidCode => PublicError::InvalidCode,
            AuthError::CodeExpired => PublicError::CodeExpired,
            AuthError::ResendLimitExceeded { retry_after } => PublicError::RetryLater { retry_after },
            AuthError::InvalidInput(message) => PublicError::InvalidInput { message },
            AuthError::StoreUnavailable(e) => PublicError::unavailable(e),
            AuthError::Repository(e) => PublicError::internal(e),
            AuthError::InternalError(e) => PublicError::internal(e),
        }
    }
}
