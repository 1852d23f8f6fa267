use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait PrincipalRepo: Send + Sync {
    /// Insert a new principal. Unique email/username collisions surface as
    /// `DuplicateEmail` / `DuplicateUsername`.
    async fn create(&self, principal: &AuthPrincipal) -> Result<(), AuthError>;

    /// Overwrite the mutable fields (password hash, verified flag, roles).
    async fn update(&self, principal: &AuthPrincipal) -> Result<(), AuthError>;

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<AuthPrincipal>, AuthError>;

    async fn find_by_email(&self, email: &Subject) -> Result<Option<AuthPrincipal>, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<AuthPrincipal>, AuthError>;
}
