use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

const DECOY_PASSWORD: &str = "decoy-password-never-matches";

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub verification_ttl: Duration,
    pub password_reset_ttl: Duration,
    pub max_resend_attempts: u64,
    pub resend_window: Duration,
    pub min_password_len: usize,
}

pub struct RealAuthService {
    principal_repo: Arc<dyn PrincipalRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    sessions: Arc<dyn SessionAuthority>,
    codes: Arc<dyn OneTimeCodeService>,
    mailer: Arc<dyn Mailer>,
    cfg: FlowConfig,
    decoy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        principal_repo: Arc<dyn PrincipalRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        sessions: Arc<dyn SessionAuthority>,
        codes: Arc<dyn OneTimeCodeService>,
        mailer: Arc<dyn Mailer>,
        cfg: FlowConfig,
    ) -> Self {
        Self {
            principal_repo,
            credential_hasher,
            sessions,
            codes,
            mailer,
            cfg,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Hashes the decoy password ahead of the first unknown-email login.
    pub async fn prepare_decoy_hash(&self) -> Result<(), AuthError> {
        self.decoy_hash().await.map(|_| ())
    }

    async fn decoy_hash(&self) -> Result<&str, AuthError> {
        self.decoy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DECOY_PASSWORD))
            .await
            .map(String::as_str)
    }

    fn validate_email(email: &str) -> Result<Subject, AuthError> {
        let subject = Subject::from_email(email);
        match subject.as_str().split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(subject),
            _ => Err(AuthError::InvalidInput("email address is not valid".to_string())),
        }
    }

    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.cfg.min_password_len {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.cfg.min_password_len
            )));
        }
        Ok(())
    }

    fn minutes(ttl: Duration) -> u64 {
        ttl.as_secs().div_ceil(60)
    }

    /// Mail failures never abort the flow; the code is already stored and
    /// the user can ask for a resend.
    async fn dispatch(&self, to: &Subject, subject: &str, body: String) {
        if let Err(e) = self.mailer.send(to.as_str(), subject, &body).await {
            warn!(%to, %subject, error = %e, "mail dispatch failed");
        }
    }

    async fn send_verification_code(&self, email: &Subject) -> Result<(), AuthError> {
        let key = CodeKey::new(CodeNamespace::Verification, email.clone());
        let code = self.codes.generate_code(CodeNamespace::Verification);
        self.codes
            .store_code(&key, &code, self.cfg.verification_ttl)
            .await?;

        let body = format!(
            "Your verification code is: {code}\n\nThis code will expire in {} minutes.",
            Self::minutes(self.cfg.verification_ttl)
        );
        self.dispatch(email, "Email Verification", body).await;
        Ok(())
    }

    /// An unknown email still costs one password verification, so response
    /// time does not tell registered addresses apart.
    async fn require_principal(
        &self,
        email: &Subject,
        password: &str,
    ) -> Result<AuthPrincipal, AuthError> {
        if let Some(principal) = self.principal_repo.find_by_email(email).await? {
            return Ok(principal);
        }
        let decoy = self.decoy_hash().await?;
        let _ = self.credential_hasher.verify_password(password, decoy).await;
        Err(AuthError::InvalidCredentials)
    }

    async fn check(&self, key: &CodeKey, provided: &str) -> Result<(), AuthError> {
        match self.codes.check_code(key, provided).await? {
            CodeCheck::Valid => Ok(()),
            CodeCheck::Invalid => Err(AuthError::InvalidCode),
            CodeCheck::Missing => Err(AuthError::CodeExpired),
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<RegisterOutcome, AuthError> {
        let RegisterInput {
            email,
            username,
            password,
        } = request;

        let email = Self::validate_email(&email)?;
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty".to_string()));
        }
        self.validate_password(&password)?;

        if let Some(existing) = self.principal_repo.find_by_email(&email).await? {
            if existing.email_verified {
                warn!(%email, "registration with existing email");
                return Err(AuthError::DuplicateEmail);
            }
            warn!(%email, "registration with unverified email");
            return Err(AuthError::VerificationPending);
        }
        if self
            .principal_repo
            .find_by_username(&username)
            .await?
            .is_some()
        {
            warn!(%username, "registration with existing username");
            return Err(AuthError::DuplicateUsername);
        }

        let principal = AuthPrincipal {
            id: PrincipalId::new_random(),
            email: email.clone(),
            username,
            password_hash: self.credential_hasher.hash_password(&password).await?,
            email_verified: false,
            // Registrants own the organization they create.
            roles: vec![Role::Admin],
        };
        self.principal_repo.create(&principal).await?;
        self.send_verification_code(&email).await?;

        info!(%email, principal_id = %principal.id, "principal registered, verification pending");

        Ok(RegisterOutcome {
            principal_id: principal.id,
            subject: email,
            state: principal.state(),
        })
    }

    async fn verify_email(&self, request: VerifyEmailInput) -> Result<LoginResult, AuthError> {
        let email = Subject::from_email(&request.email);
        let mut principal = self
            .principal_repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        let key = CodeKey::new(CodeNamespace::Verification, email.clone());
        self.check(&key, request.code.trim()).await?;

        principal.email_verified = true;
        self.principal_repo.update(&principal).await?;
        self.codes.clear_attempts(&key).await;

        let tokens = self.sessions.issue(&email).await?;
        info!(%email, "email verified");

        Ok(LoginResult {
            principal_id: principal.id,
            subject: email,
            tokens,
        })
    }

    async fn resend_verification_code(&self, email: &str) -> Result<u64, AuthError> {
        let email = Subject::from_email(email);
        let Some(principal) = self.principal_repo.find_by_email(&email).await? else {
            info!(%email, "resend requested for unknown email, ignoring");
            return Ok(self.cfg.max_resend_attempts);
        };
        if principal.state() == AccountState::Active {
            return Err(AuthError::AlreadyVerified);
        }

        let key = CodeKey::new(CodeNamespace::Verification, email.clone());
        let remaining = self
            .codes
            .rate_limited_resend(&key, self.cfg.max_resend_attempts, self.cfg.resend_window)
            .await?;
        self.send_verification_code(&email).await?;

        info!(%email, remaining, "verification code resent");
        Ok(remaining)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { email, password } = request;
        let email = Subject::from_email(&email);

        let principal = self.require_principal(&email, &password).await.inspect_err(|_| {
            warn!(%email, "login failed");
        })?;
        if principal.state() != AccountState::Active {
            warn!(%email, "login before email verification");
            return Err(AuthError::EmailNotVerified);
        }

        let ok = self
            .credential_hasher
            .verify_password(&password, &principal.password_hash)
            .await?;
        if !ok {
            warn!(%email, "login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.sessions.issue(&email).await?;
        info!(%email, "login succeeded");

        Ok(LoginResult {
            principal_id: principal.id,
            subject: email,
            tokens,
        })
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let subject = self
            .sessions
            .validate(access_token, TokenClass::Access)
            .await?;
        self.sessions.invalidate_all(&subject).await?;
        self.sessions.invalidate(access_token).await?;

        info!(%subject, "logged out");
        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let subject = self
            .sessions
            .redeem(refresh_token, TokenClass::Refresh)
            .await?;

        let tokens = self.sessions.issue(&subject).await?;
        info!(%subject, "tokens rotated");
        Ok(tokens)
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Subject::from_email(email);
        let known = self.principal_repo.find_by_email(&email).await?;
        if !known.is_some_and(|p| p.state() == AccountState::Active) {
            info!(%email, "password reset requested for unknown or unverified email, ignoring");
            return Ok(());
        }

        let key = CodeKey::new(CodeNamespace::PasswordReset, email.clone());
        self.codes
            .rate_limited_resend(&key, self.cfg.max_resend_attempts, self.cfg.resend_window)
            .await?;

        let code = self.codes.generate_code(CodeNamespace::PasswordReset);
        self.codes
            .store_code(&key, &code, self.cfg.password_reset_ttl)
            .await?;
        let body = format!(
            "We received a request to reset your password. Your password reset code is: {code}\n\n\
             This code will expire in {} minutes.\n\n\
             If you didn't request this, please ignore this email.",
            Self::minutes(self.cfg.password_reset_ttl)
        );
        self.dispatch(&email, "Password Reset Request", body).await;

        info!(%email, "password reset code sent");
        Ok(())
    }

    async fn reset_password(&self, request: ResetPasswordInput) -> Result<(), AuthError> {
        let email = Subject::from_email(&request.email);
        self.validate_password(&request.new_password)?;
        let mut principal = self
            .principal_repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        let key = CodeKey::new(CodeNamespace::PasswordReset, email.clone());
        self.check(&key, request.code.trim()).await?;

        principal.password_hash = self
            .credential_hasher
            .hash_password(&request.new_password)
            .await?;
        self.principal_repo.update(&principal).await?;
        self.codes.clear_attempts(&key).await;
        self.sessions.invalidate_all(&email).await?;

        info!(%email, "password reset, all sessions invalidated");
        Ok(())
    }

    async fn change_password(&self, request: ChangePasswordInput) -> Result<(), AuthError> {
        let email = Subject::from_email(&request.email);
        self.validate_password(&request.new_password)?;
        let mut principal = self
            .require_principal(&email, &request.current_password)
            .await?;

        let ok = self
            .credential_hasher
            .verify_password(&request.current_password, &principal.password_hash)
            .await?;
        if !ok {
            warn!(%email, "password change with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        principal.password_hash = self
            .credential_hasher
            .hash_password(&request.new_password)
            .await?;
        self.principal_repo.update(&principal).await?;
        self.sessions.invalidate_all(&email).await?;

        info!(%email, "password changed, all sessions invalidated");
        Ok(())
    }
}
