use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Principals keyed by normalized email, which makes email uniqueness atomic.
#[derive(Default)]
pub struct MemoryPrincipalRepo {
    by_email: DashMap<Subject, AuthPrincipal>,
}

impl MemoryPrincipalRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PrincipalRepo for MemoryPrincipalRepo {
    async fn create(&self, principal: &AuthPrincipal) -> Result<(), AuthError> {
        if self
            .by_email
            .iter()
            .any(|p| p.username == principal.username)
        {
            return Err(AuthError::DuplicateUsername);
        }
        match self.by_email.entry(principal.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(principal.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, principal: &AuthPrincipal) -> Result<(), AuthError> {
        match self.by_email.get_mut(&principal.email) {
            Some(mut existing) if existing.id == principal.id => {
                existing.password_hash = principal.password_hash.clone();
                existing.email_verified = principal.email_verified;
                existing.roles = principal.roles.clone();
                Ok(())
            }
            _ => Err(AuthError::Repository(format!(
                "principal {} not found",
                principal.id
            ))),
        }
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<AuthPrincipal>, AuthError> {
        Ok(self
            .by_email
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.value().clone()))
    }

    async fn find_by_email(&self, email: &Subject) -> Result<Option<AuthPrincipal>, AuthError> {
        Ok(self.by_email.get(email).map(|p| p.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<AuthPrincipal>, AuthError> {
        Ok(self
            .by_email
            .iter()
            .find(|p| p.username == username)
            .map(|p| p.value().clone()))
    }
}
