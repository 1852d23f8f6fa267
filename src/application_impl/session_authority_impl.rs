use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Issuing a new pair drops every earlier session of the subject.
    pub single_session: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        SessionPolicy {
            single_session: true,
        }
    }
}

fn reject(err: TokenError) -> AuthError {
    match err {
        TokenError::InvalidSignature => AuthError::InvalidToken(TokenRejection::InvalidSignature),
        TokenError::Expired => AuthError::InvalidToken(TokenRejection::Expired),
        TokenError::Malformed => AuthError::InvalidToken(TokenRejection::Malformed),
        TokenError::Encoding => AuthError::InternalError("token encoding failed".to_string()),
    }
}

/// A verified token is still live, so its blacklist entry must outlast the
/// second it expires in even when less than that remains.
const MIN_BLACKLIST_TTL: Duration = Duration::from_secs(1);

fn blacklist_ttl(verified: &VerifiedToken, now: DateTime<Utc>) -> Duration {
    verified.remaining_ttl(now).max(MIN_BLACKLIST_TTL)
}

fn fail_closed(err: StoreError) -> AuthError {
    warn!(error = %err, "revocation store check failed, rejecting token");
    AuthError::from(err)
}

pub struct RealSessionAuthority {
    codec: Arc<dyn TokenCodec>,
    store: Arc<dyn RevocationStore>,
    policy: SessionPolicy,
}

impl RealSessionAuthority {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        store: Arc<dyn RevocationStore>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            codec,
            store,
            policy,
        }
    }

    fn verify_class(&self, token: &str, expected: TokenClass) -> Result<VerifiedToken, AuthError> {
        let verified = self.codec.verify(token).map_err(reject)?;
        if verified.class != expected {
            debug!(subject = %verified.subject, class = %verified.class, %expected, "token class mismatch");
            return Err(AuthError::InvalidToken(TokenRejection::WrongClass));
        }
        Ok(verified)
    }

    async fn ensure_not_blacklisted(&self, verified: &VerifiedToken) -> Result<(), AuthError> {
        if self
            .store
            .is_blacklisted(&verified.signature)
            .await
            .map_err(fail_closed)?
        {
            debug!(subject = %verified.subject, "token is blacklisted");
            return Err(AuthError::InvalidToken(TokenRejection::Blacklisted));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionAuthority for RealSessionAuthority {
    async fn issue(&self, subject: &Subject) -> Result<AuthTokens, AuthError> {
        let access = self.codec.issue(subject, TokenClass::Access).map_err(reject)?;
        let refresh = self.codec.issue(subject, TokenClass::Refresh).map_err(reject)?;

        let entries = [
            SessionEntry {
                signature: access.signature.clone(),
                ttl: access.ttl(),
            },
            SessionEntry {
                signature: refresh.signature.clone(),
                ttl: refresh.ttl(),
            },
        ];

        // Tokens only become valid once registered, so a failed write leaves nothing usable behind.
        let registered = if self.policy.single_session {
            self.store.replace_session(subject, &entries).await
        } else {
            self.store.add_to_session(subject, &entries).await
        };
        registered.map_err(|e| {
            warn!(%subject, error = %e, "session registration failed");
            AuthError::from(e)
        })?;

        info!(%subject, single_session = self.policy.single_session, "session issued");

        Ok(AuthTokens {
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        })
    }

    async fn validate(&self, token: &str, expected: TokenClass) -> Result<Subject, AuthError> {
        let verified = self.verify_class(token, expected)?;
        self.ensure_not_blacklisted(&verified).await?;

        if !self
            .store
            .is_in_session(&verified.subject, &verified.signature)
            .await
            .map_err(fail_closed)?
        {
            debug!(subject = %verified.subject, "token not in session set");
            return Err(AuthError::InvalidToken(TokenRejection::SessionNotFound));
        }

        Ok(verified.subject)
    }

    async fn redeem(&self, token: &str, expected: TokenClass) -> Result<Subject, AuthError> {
        let verified = self.verify_class(token, expected)?;
        self.ensure_not_blacklisted(&verified).await?;

        let claimed = self
            .store
            .remove_from_session(&verified.subject, &verified.signature)
            .await
            .map_err(fail_closed)?;
        if !claimed {
            warn!(subject = %verified.subject, class = %verified.class, "token redeemed twice or session gone");
            return Err(AuthError::InvalidToken(TokenRejection::SessionNotFound));
        }

        let ttl = blacklist_ttl(&verified, Utc::now());
        if let Err(e) = self.store.blacklist(&verified.signature, ttl).await {
            // Already out of the session set, so membership alone rejects it.
            warn!(subject = %verified.subject, error = %e, "blacklisting redeemed token failed");
        }

        Ok(verified.subject)
    }

    async fn invalidate(&self, token: &str) -> Result<(), AuthError> {
        let verified = match self.codec.verify(token) {
            Ok(verified) => verified,
            Err(TokenError::Expired) => {
                debug!("invalidate on expired token is a no-op");
                return Ok(());
            }
            Err(e) => return Err(reject(e)),
        };

        let ttl = blacklist_ttl(&verified, Utc::now());
        self.store.blacklist(&verified.signature, ttl).await?;
        if let Err(e) = self
            .store
            .remove_from_session(&verified.subject, &verified.signature)
            .await
        {
            warn!(subject = %verified.subject, error = %e, "session cleanup after blacklist failed");
        }

        info!(subject = %verified.subject, class = %verified.class, ttl_secs = ttl.as_secs(), "token invalidated");
        Ok(())
    }

    async fn invalidate_all(&self, subject: &Subject) -> Result<(), AuthError> {
        self.store.clear_sessions(subject).await?;
        info!(%subject, "all sessions invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtHs256Codec};
    use crate::infra_memory::MemoryRevocationStore;

    fn codec(access_ttl: Duration) -> Arc<dyn TokenCodec> {
        Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "token-authority".to_string(),
            audience: "test-client".to_string(),
            access_ttl,
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            signing_key: b"session-test-key".to_vec(),
        }))
    }

    fn authority(single_session: bool) -> RealSessionAuthority {
        RealSessionAuthority::new(
            codec(Duration::from_secs(15 * 60)),
            Arc::new(MemoryRevocationStore::new()),
            SessionPolicy { single_session },
        )
    }

    fn alice() -> Subject {
        Subject::from_email("alice@example.com")
    }

    fn rejection(err: AuthError) -> TokenRejection {
        match err {
            AuthError::InvalidToken(reason) => reason,
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn issued_access_token_validates() {
        let auth = authority(true);
        let tokens = auth.issue(&alice()).await.unwrap();

        let subject = auth
            .validate(&tokens.access_token.0, TokenClass::Access)
            .await
            .unwrap();
        assert_eq!(subject, alice());
        assert!(tokens.refresh_token_expires_at > tokens.access_token_expires_at);
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let auth = authority(true);
        let tokens = auth.issue(&alice()).await.unwrap();

        let err = auth
            .validate(&tokens.refresh_token.0, TokenClass::Access)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::WrongClass);
        let err = auth
            .validate(&tokens.access_token.0, TokenClass::Refresh)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::WrongClass);
    }

    #[tokio::test]
    async fn invalidated_token_fails_before_expiry() {
        let auth = authority(true);
        let tokens = auth.issue(&alice()).await.unwrap();

        auth.invalidate(&tokens.access_token.0).await.unwrap();
        let err = auth
            .validate(&tokens.access_token.0, TokenClass::Access)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::Blacklisted);

        // Idempotent.
        auth.invalidate(&tokens.access_token.0).await.unwrap();
        // The sibling refresh token is untouched.
        auth.validate(&tokens.refresh_token.0, TokenClass::Refresh)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn single_session_policy_retires_previous_pair() {
        let auth = authority(true);
        let first = auth.issue(&alice()).await.unwrap();
        let second = auth.issue(&alice()).await.unwrap();

        let err = auth
            .validate(&first.access_token.0, TokenClass::Access)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::SessionNotFound);
        let err = auth
            .validate(&first.refresh_token.0, TokenClass::Refresh)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::SessionNotFound);
        auth.validate(&second.access_token.0, TokenClass::Access)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn overlapping_policy_keeps_both_pairs() {
        let auth = authority(false);
        let first = auth.issue(&alice()).await.unwrap();
        let second = auth.issue(&alice()).await.unwrap();

        auth.validate(&first.access_token.0, TokenClass::Access)
            .await
            .unwrap();
        auth.validate(&second.access_token.0, TokenClass::Access)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalidate_all_drops_every_token_of_subject() {
        let auth = authority(false);
        let first = auth.issue(&alice()).await.unwrap();
        let second = auth.issue(&alice()).await.unwrap();
        let bob = Subject::from_email("bob@example.com");
        let bobs = auth.issue(&bob).await.unwrap();

        auth.invalidate_all(&alice()).await.unwrap();

        for token in [&first.access_token.0, &second.access_token.0] {
            let err = auth.validate(token, TokenClass::Access).await.unwrap_err();
            assert_eq!(rejection(err), TokenRejection::SessionNotFound);
        }
        auth.validate(&bobs.access_token.0, TokenClass::Access)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn redeem_consumes_at_most_once() {
        let auth = authority(true);
        let tokens = auth.issue(&alice()).await.unwrap();

        let subject = auth
            .redeem(&tokens.refresh_token.0, TokenClass::Refresh)
            .await
            .unwrap();
        assert_eq!(subject, alice());

        let err = auth
            .redeem(&tokens.refresh_token.0, TokenClass::Refresh)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::Blacklisted);
    }

    #[tokio::test]
    async fn concurrent_redeems_yield_one_winner() {
        let auth = Arc::new(authority(true));
        let tokens = auth.issue(&alice()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = auth.clone();
            let token = tokens.refresh_token.0.clone();
            handles.push(tokio::spawn(async move {
                auth.redeem(&token, TokenClass::Refresh).await.is_ok()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn tampered_token_cannot_be_invalidated_or_validated() {
        let auth = authority(true);
        let err = auth.invalidate("a.b.c").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
        let err = auth.validate("garbage", TokenClass::Access).await.unwrap_err();
        assert_eq!(rejection(err), TokenRejection::Malformed);
    }

    #[tokio::test]
    async fn invalidating_expired_token_is_a_no_op() {
        let auth = RealSessionAuthority::new(
            codec(Duration::ZERO),
            Arc::new(MemoryRevocationStore::new()),
            SessionPolicy::default(),
        );
        let tokens = auth.issue(&alice()).await.unwrap();

        let err = auth
            .validate(&tokens.access_token.0, TokenClass::Access)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::Expired);

        auth.invalidate(&tokens.access_token.0).await.unwrap();
        let err = auth
            .validate(&tokens.access_token.0, TokenClass::Access)
            .await
            .unwrap_err();
        assert_eq!(rejection(err), TokenRejection::Expired);
    }

    #[tokio::test]
    async fn zero_ttl_access_token_never_validates() {
        let auth = RealSessionAuthority::new(
            codec(Duration::ZERO),
            Arc::new(MemoryRevocationStore::new()),
            SessionPolicy::default(),
        );
        for _ in 0..20 {
            let tokens = auth.issue(&alice()).await.unwrap();
            let err = auth
                .validate(&tokens.access_token.0, TokenClass::Access)
                .await
                .unwrap_err();
            assert_eq!(rejection(err), TokenRejection::Expired);
        }
    }

    #[test]
    fn blacklist_outlives_the_final_second() {
        let now = Utc::now();
        let verified = VerifiedToken {
            subject: alice(),
            class: TokenClass::Access,
            signature: TokenSignature("sig".to_string()),
            jti: "jti".to_string(),
            issued_at: now - chrono::Duration::seconds(60),
            expires_at: now + chrono::Duration::milliseconds(200),
        };
        assert_eq!(blacklist_ttl(&verified, now), MIN_BLACKLIST_TTL);
        assert_eq!(
            blacklist_ttl(&verified, now - chrono::Duration::seconds(30)),
            Duration::from_millis(30_200)
        );
    }

    #[tokio::test]
    async fn invalidate_blacklists_for_at_least_the_minimum() {
        let mut store = MockRevocationStore::new();
        store
            .expect_blacklist()
            .withf(|_, ttl| *ttl >= MIN_BLACKLIST_TTL)
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_remove_from_session().returning(|_, _| Ok(true));

        let codec = codec(Duration::from_secs(60));
        let token = codec.issue(&alice(), TokenClass::Access).unwrap();
        let auth = RealSessionAuthority::new(codec, Arc::new(store), SessionPolicy::default());

        auth.invalidate(&token.token).await.unwrap();
    }

    #[tokio::test]
    async fn store_outage_during_validate_fails_closed() {
        let mut store = MockRevocationStore::new();
        store
            .expect_is_blacklisted()
            .returning(|_| Err(StoreError::Timeout(Duration::from_millis(250))));
        store.expect_is_in_session().never();

        let codec = codec(Duration::from_secs(60));
        let token = codec.issue(&alice(), TokenClass::Access).unwrap();
        let auth = RealSessionAuthority::new(codec, Arc::new(store), SessionPolicy::default());

        let err = auth.validate(&token.token, TokenClass::Access).await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn membership_outage_fails_closed() {
        let mut store = MockRevocationStore::new();
        store.expect_is_blacklisted().returning(|_| Ok(false));
        store
            .expect_is_in_session()
            .returning(|_, _| Err(StoreError::Unavailable("connection refused".to_string())));

        let codec = codec(Duration::from_secs(60));
        let token = codec.issue(&alice(), TokenClass::Access).unwrap();
        let auth = RealSessionAuthority::new(codec, Arc::new(store), SessionPolicy::default());

        let err = auth.validate(&token.token, TokenClass::Access).await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_registration_returns_no_tokens() {
        let mut store = MockRevocationStore::new();
        store
            .expect_replace_session()
            .returning(|_, _| Err(StoreError::Unavailable("down".to_string())));

        let auth = RealSessionAuthority::new(
            codec(Duration::from_secs(60)),
            Arc::new(store),
            SessionPolicy::default(),
        );
        let err = auth.issue(&alice()).await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn crypto_failure_skips_store_entirely() {
        let mut store = MockRevocationStore::new();
        store.expect_is_blacklisted().never();
        store.expect_is_in_session().never();

        let auth = RealSessionAuthority::new(
            codec(Duration::from_secs(60)),
            Arc::new(store),
            SessionPolicy::default(),
        );
        let err = auth.validate("x.y.z", TokenClass::Access).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn session_cleanup_failure_does_not_fail_invalidate() {
        let mut store = MockRevocationStore::new();
        store.expect_blacklist().times(1).returning(|_, _| Ok(()));
        store
            .expect_remove_from_session()
            .returning(|_, _| Err(StoreError::Unavailable("down".to_string())));

        let codec = codec(Duration::from_secs(60));
        let token = codec.issue(&alice(), TokenClass::Access).unwrap();
        let auth = RealSessionAuthority::new(codec, Arc::new(store), SessionPolicy::default());

        auth.invalidate(&token.token).await.unwrap();
    }
}
