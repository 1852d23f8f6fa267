use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub session_authority: Arc<dyn SessionAuthority>,
    pool: Option<Pool<MySql>>,
    cancel: CancellationToken,
    mail_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        if settings.token.signing_key.is_empty() || settings.codes.hmac_key.is_empty() {
            return Err(anyhow::anyhow!(
                "token.signing_key and codes.hmac_key must be set"
            ));
        }

        let revocation_store: Arc<dyn RevocationStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemoryRevocationStore::new()),
            "redis" => {
                let redis_client = redis::Client::open(settings.store.redis_url.as_str())?;
                let redis_manager = tokio::time::timeout(
                    settings.store.timeout(),
                    redis_client.get_connection_manager(),
                )
                .await
                .map_err(|_| anyhow::anyhow!("redis connect timed out"))??;
                Arc::new(RedisRevocationStore::new(
                    redis_manager,
                    RedisKeys {
                        blacklist_prefix: settings.store.blacklist_prefix.clone(),
                        session_prefix: settings.store.session_prefix.clone(),
                    },
                    settings.store.timeout(),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let mut pool = None;
        let principal_repo: Arc<dyn PrincipalRepo> = match settings.principal.backend.as_str() {
            "memory" => Arc::new(MemoryPrincipalRepo::new()),
            "mysql" => {
                let mysql = Pool::<MySql>::connect(&settings.principal.mysql_url).await?;
                pool = Some(mysql.clone());
                Arc::new(MySqlPrincipalRepo::new(mysql))
            }
            other => return Err(anyhow::anyhow!("Unknown principal backend: {}", other)),
        };

        let transport: Arc<dyn Mailer> = match settings.mail.backend.as_str() {
            "log" => Arc::new(LogMailer::new()),
            "memory" => Arc::new(RecordingMailer::new()),
            "smtp" => {
                let smtp = settings
                    .mail
                    .smtp
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("mail.backend = \"smtp\" needs [mail.smtp]"))?;
                Arc::new(SmtpMailer::new(&SmtpConfig {
                    host: smtp.host.clone(),
                    port: smtp.port,
                    username: smtp.username.clone(),
                    password: smtp.password.clone(),
                    from: smtp.from.clone(),
                    starttls: smtp.starttls,
                })?)
            }
            other => return Err(anyhow::anyhow!("Unknown mail backend: {}", other)),
        };

        let cancel = CancellationToken::new();
        let queue = &settings.mail.queue;
        let (mailer, mail_worker): (Arc<dyn Mailer>, _) = if queue.enabled {
            let (queued, handle) = QueuedMailer::start(
                transport,
                queue.capacity,
                MailRetryPolicy {
                    max_attempts: queue.max_attempts,
                    base_delay: Duration::from_millis(queue.retry_base_ms),
                    max_delay: Duration::from_millis(queue.retry_max_ms),
                },
                cancel.clone(),
            );
            (Arc::new(queued), Some(handle))
        } else {
            (transport, None)
        };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.token.issuer.clone(),
            audience: settings.token.audience.clone(),
            access_ttl: Duration::from_secs(settings.token.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.token.refresh_ttl_secs),
            signing_key: settings.token.signing_key.clone().into_bytes(),
        }));

        let session_authority: Arc<dyn SessionAuthority> = Arc::new(RealSessionAuthority::new(
            token_codec,
            revocation_store.clone(),
            SessionPolicy {
                single_session: settings.session.single_session,
            },
        ));

        let code_service: Arc<dyn OneTimeCodeService> = Arc::new(HmacCodeService::new(
            revocation_store,
            settings.codes.hmac_key.clone().into_bytes(),
        ));

        let credential_hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2PasswordHasher::new(Argon2Config {
                memory_kib: settings.password.argon2_memory_kib,
                iterations: settings.password.argon2_iterations,
                parallelism: settings.password.argon2_parallelism,
            })?);

        let auth = Arc::new(RealAuthService::new(
            principal_repo,
            credential_hasher,
            session_authority.clone(),
            code_service,
            mailer,
            FlowConfig {
                verification_ttl: Duration::from_secs(settings.codes.verification_ttl_secs),
                password_reset_ttl: Duration::from_secs(settings.codes.password_reset_ttl_secs),
                max_resend_attempts: settings.codes.max_resend_attempts,
                resend_window: Duration::from_secs(settings.codes.resend_window_secs),
                min_password_len: settings.password.min_length,
            },
        ));
        auth.prepare_decoy_hash().await?;
        let auth_service: Arc<dyn AuthService> = auth;

        info!(
            store = %settings.store.backend,
            principal = %settings.principal.backend,
            mail = %settings.mail.backend,
            mail_queued = queue.enabled,
            "server started"
        );

        Ok(Self {
            auth_service,
            session_authority,
            pool,
            cancel,
            mail_worker: Mutex::new(mail_worker),
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        self.cancel.cancel();

        let mail_worker = self.mail_worker.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = mail_worker {
            if let Err(e) = handle.await {
                warn!(error = %e, "mail worker ended abnormally");
            }
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
