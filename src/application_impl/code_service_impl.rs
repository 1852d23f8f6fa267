use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use hmac::{Hmac, Mac};
use nanoid::nanoid;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
const VERIFICATION_CODE_LEN: usize = 6;
const RESET_CODE_LEN: usize = 16;

/// One-time codes kept as HMAC-SHA256 digests; the store never sees plaintext.
pub struct HmacCodeService {
    store: Arc<dyn RevocationStore>,
    hmac_key: Vec<u8>,
}

impl HmacCodeService {
    pub fn new(store: Arc<dyn RevocationStore>, hmac_key: Vec<u8>) -> Self {
        Self { store, hmac_key }
    }

    fn mac(&self) -> Result<Hmac<Sha256>, AuthError> {
        Hmac::<Sha256>::new_from_slice(&self.hmac_key)
            .map_err(|e| AuthError::InternalError(format!("hmac key: {e}")))
    }

    fn hmac_hex(&self, code: &str) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(code.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time comparison of `provided` against a stored hex digest.
    fn matches(&self, provided: &str, stored_hex: &str) -> Result<bool, AuthError> {
        let stored = hex::decode(stored_hex)
            .map_err(|e| AuthError::InternalError(format!("stored code digest: {e}")))?;
        let mut mac = self.mac()?;
        mac.update(provided.as_bytes());
        Ok(mac.verify_slice(&stored).is_ok())
    }
}

#[async_trait::async_trait]
impl OneTimeCodeService for HmacCodeService {
    fn generate_code(&self, namespace: CodeNamespace) -> String {
        match namespace {
            CodeNamespace::Verification => nanoid!(VERIFICATION_CODE_LEN, &DIGITS),
            CodeNamespace::PasswordReset => nanoid!(RESET_CODE_LEN),
        }
    }

    async fn store_code(
        &self,
        key: &CodeKey,
        plain_code: &str,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let digest = self.hmac_hex(plain_code)?;
        self.store.put_code(key, &digest, ttl).await?;
        debug!(owner = %key.owner, namespace = %key.namespace, "one-time code stored");
        Ok(())
    }

    async fn check_code(&self, key: &CodeKey, provided: &str) -> Result<CodeCheck, AuthError> {
        let Some(stored) = self.store.get_code(key).await? else {
            return Ok(CodeCheck::Missing);
        };
        if !self.matches(provided, &stored)? {
            warn!(owner = %key.owner, namespace = %key.namespace, "one-time code mismatch");
            return Ok(CodeCheck::Invalid);
        }
        // Whoever deletes the code owns the success.
        if self.store.delete_code(key).await? {
            Ok(CodeCheck::Valid)
        } else {
            Ok(CodeCheck::Missing)
        }
    }

    async fn rate_limited_resend(
        &self,
        key: &CodeKey,
        max_attempts: u64,
        window: Duration,
    ) -> Result<u64, AuthError> {
        let attempts = self.store.increment_attempts(key, window).await?;
        if attempts.count > max_attempts {
            let retry_after = Utc::now()
                + chrono::Duration::from_std(attempts.resets_in).unwrap_or(chrono::Duration::zero());
            warn!(owner = %key.owner, namespace = %key.namespace, count = attempts.count, "resend limit reached");
            return Err(AuthError::ResendLimitExceeded { retry_after });
        }
        debug!(owner = %key.owner, count = attempts.count, max_attempts, "resend attempt counted");
        Ok(max_attempts - attempts.count)
    }

    async fn clear_attempts(&self, key: &CodeKey) {
        if let Err(e) = self.store.clear_attempts(key).await {
            warn!(owner = %key.owner, error = %e, "clearing attempt counter failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryRevocationStore;
    use tokio::time::advance;

    fn service() -> (HmacCodeService, Arc<MemoryRevocationStore>) {
        let store = Arc::new(MemoryRevocationStore::new());
        (HmacCodeService::new(store.clone(), b"code-key".to_vec()), store)
    }

    fn key(ns: CodeNamespace) -> CodeKey {
        CodeKey::new(ns, Subject::from_email("a@x.com"))
    }

    #[test]
    fn generated_codes_have_namespace_shape() {
        let (svc, _) = service();
        let code = svc.generate_code(CodeNamespace::Verification);
        assert_eq!(code.len(), VERIFICATION_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(svc.generate_code(CodeNamespace::PasswordReset).len(), RESET_CODE_LEN);
    }

    #[tokio::test]
    async fn store_keeps_only_the_digest() {
        let (svc, store) = service();
        let key = key(CodeNamespace::Verification);
        svc.store_code(&key, "123456", Duration::from_secs(60))
            .await
            .unwrap();

        let stored = store.get_code(&key).await.unwrap().unwrap();
        assert_ne!(stored, "123456");
        assert_eq!(stored.len(), 64);
    }

    #[tokio::test]
    async fn correct_code_succeeds_exactly_once() {
        let (svc, _) = service();
        let key = key(CodeNamespace::Verification);
        svc.store_code(&key, "123456", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(svc.check_code(&key, "654321").await.unwrap(), CodeCheck::Invalid);
        assert_eq!(svc.check_code(&key, "123456").await.unwrap(), CodeCheck::Valid);
        assert_eq!(svc.check_code(&key, "123456").await.unwrap(), CodeCheck::Missing);
    }

    #[tokio::test]
    async fn namespaces_do_not_share_codes() {
        let (svc, _) = service();
        svc.store_code(&key(CodeNamespace::Verification), "123456", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            svc.check_code(&key(CodeNamespace::PasswordReset), "123456")
                .await
                .unwrap(),
            CodeCheck::Missing
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resend_limit_applies_per_window() {
        let (svc, _) = service();
        let key = key(CodeNamespace::Verification);
        let window = Duration::from_secs(3600);

        assert_eq!(svc.rate_limited_resend(&key, 3, window).await.unwrap(), 2);
        assert_eq!(svc.rate_limited_resend(&key, 3, window).await.unwrap(), 1);
        assert_eq!(svc.rate_limited_resend(&key, 3, window).await.unwrap(), 0);

        let before = Utc::now();
        match svc.rate_limited_resend(&key, 3, window).await {
            Err(AuthError::ResendLimitExceeded { retry_after }) => assert!(retry_after >= before),
            other => panic!("expected ResendLimitExceeded, got {other:?}"),
        }

        advance(window + Duration::from_secs(1)).await;
        assert_eq!(svc.rate_limited_resend(&key, 3, window).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_attempts_resets_counter() {
        let (svc, _) = service();
        let key = key(CodeNamespace::Verification);
        let window = Duration::from_secs(3600);
        svc.rate_limited_resend(&key, 1, window).await.unwrap();
        svc.clear_attempts(&key).await;
        assert_eq!(svc.rate_limited_resend(&key, 1, window).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_unavailable() {
        let mut store = MockRevocationStore::new();
        store
            .expect_get_code()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));
        let svc = HmacCodeService::new(Arc::new(store), b"k".to_vec());

        let err = svc
            .check_code(&key(CodeNamespace::Verification), "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }
}
