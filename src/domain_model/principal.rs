use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub uuid::Uuid);

impl PrincipalId {
    pub fn new_random() -> Self {
        PrincipalId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(PrincipalId)
    }
}

/// Stable token subject: the principal's normalized email address.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn from_email(email: &str) -> Self {
        Subject(email.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN"),
            Role::User => f.write_str("USER"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AccountState {
    Unregistered,
    PendingVerification,
    Active,
}

impl AccountState {
    pub fn of(principal: Option<&AuthPrincipal>) -> Self {
        match principal {
            None => AccountState::Unregistered,
            Some(p) if p.email_verified => AccountState::Active,
            Some(_) => AccountState::PendingVerification,
        }
    }
}

/// The narrow capability record the session layer works with. Organization
/// and employee associations live elsewhere.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub id: PrincipalId,
    pub email: Subject,
    pub username: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub roles: Vec<Role>,
}

impl AuthPrincipal {
    pub fn state(&self) -> AccountState {
        AccountState::of(Some(self))
    }
}
