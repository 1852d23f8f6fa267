use crate::domain_model::*;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token could not be encoded")]
    Encoding,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub class: TokenClass,
    pub signature: TokenSignature,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn ttl(&self) -> Duration {
        (self.expires_at - self.issued_at).to_std().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: Subject,
    pub class: TokenClass,
    pub signature: TokenSignature,
    pub jti: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerifiedToken {
    /// Time left before natural expiry, clamped at zero.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

/// Signs and verifies compact bearer tokens. Pure: no I/O, no shared state.
pub trait TokenCodec: Send + Sync {
    fn issue(&self, subject: &Subject, class: TokenClass) -> Result<IssuedToken, TokenError>;
    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError>;
}
