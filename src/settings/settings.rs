use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub store: Store,
    pub principal: Principal,
    pub mail: Mail,
    pub token: Token,
    pub session: Session,
    pub codes: Codes,
    pub password: Password,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "redis"
    pub redis_url: String,
    pub timeout_ms: u64,
    pub blacklist_prefix: String,
    pub session_prefix: String,
}

impl Store {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The memory backend lives and dies with the process.
    pub fn persists_across_processes(&self) -> bool {
        self.backend != "memory"
    }
}

#[derive(Deserialize)]
pub struct Principal {
    pub backend: String, // "memory" or "mysql"
    pub mysql_url: String,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("backend", &self.backend)
            .field("mysql_url", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Mail {
    pub backend: String, // "log", "memory" or "smtp"
    #[serde(default)]
    pub queue: MailQueue,
    pub smtp: Option<Smtp>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailQueue {
    pub enabled: bool,
    pub capacity: usize,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for MailQueue {
    fn default() -> Self {
        MailQueue {
            enabled: true,
            capacity: 1024,
            max_attempts: 5,
            retry_base_ms: 500,
            retry_max_ms: 30_000,
        }
    }
}

#[derive(Deserialize)]
pub struct Smtp {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    #[serde(default)]
    pub starttls: bool,
}

impl fmt::Debug for Smtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Smtp")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("starttls", &self.starttls)
            .finish()
    }
}

#[derive(Deserialize)]
pub struct Token {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_key", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Session {
    #[serde(default = "single_session_default")]
    pub single_session: bool,
}

fn single_session_default() -> bool {
    true
}

#[derive(Deserialize)]
pub struct Codes {
    pub hmac_key: String,
    pub verification_ttl_secs: u64,
    pub password_reset_ttl_secs: u64,
    pub max_resend_attempts: u64,
    pub resend_window_secs: u64,
}

impl fmt::Debug for Codes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codes")
            .field("hmac_key", &"<redacted>")
            .field("verification_ttl_secs", &self.verification_ttl_secs)
            .field("password_reset_ttl_secs", &self.password_reset_ttl_secs)
            .field("max_resend_attempts", &self.max_resend_attempts)
            .field("resend_window_secs", &self.resend_window_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Password {
    pub min_length: usize,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then applies `AUTHORITY__SECTION__KEY` overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("AUTHORITY")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
