use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use std::future::Future;
use std::time::Duration;

const SESSION_ADD: &str = include_str!("session_add.lua");
const ATTEMPTS_INCR: &str = include_str!("attempts_incr.lua");

#[derive(Debug, Clone)]
pub struct RedisKeys {
    pub blacklist_prefix: String,
    pub session_prefix: String,
}

pub struct RedisRevocationStore {
    conn: ConnectionManager,
    keys: RedisKeys,
    timeout: Duration,
    session_add: Script,
    attempts_incr: Script,
}

/// Redis rejects a zero expiry.
fn millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager, keys: RedisKeys, timeout: Duration) -> Self {
        RedisRevocationStore {
            conn,
            keys,
            timeout,
            session_add: Script::new(SESSION_ADD),
            attempts_incr: Script::new(ATTEMPTS_INCR),
        }
    }

    fn blacklist_key(&self, signature: &TokenSignature) -> String {
        format!("{}:{}", self.keys.blacklist_prefix, signature.as_str())
    }

    fn session_key(&self, subject: &Subject) -> String {
        format!("{}:{}", self.keys.session_prefix, subject.as_str())
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(|e| StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    async fn write_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
        replace: bool,
    ) -> Result<(), StoreError> {
        let ttl = entries.iter().map(|e| e.ttl).max().unwrap_or(Duration::ZERO);
        let mut invocation = self.session_add.prepare_invoke();
        invocation
            .key(self.session_key(subject))
            .arg(if replace { "1" } else { "0" })
            .arg(millis(ttl));
        for entry in entries {
            invocation.arg(entry.signature.as_str());
        }

        let mut conn = self.conn.clone();
        let _: i64 = self.timed(invocation.invoke_async(&mut conn)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn blacklist(
        &self,
        signature: &TokenSignature,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = self.blacklist_key(signature);
        let mut conn = self.conn.clone();
        let _: () = self.timed(conn.pset_ex(&key, 1, millis(ttl))).await?;
        Ok(())
    }

    async fn is_blacklisted(&self, signature: &TokenSignature) -> Result<bool, StoreError> {
        let key = self.blacklist_key(signature);
        let mut conn = self.conn.clone();
        self.timed(conn.exists(&key)).await
    }

    async fn add_to_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
    ) -> Result<(), StoreError> {
        self.write_session(subject, entries, false).await
    }

    async fn replace_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
    ) -> Result<(), StoreError> {
        self.write_session(subject, entries, true).await
    }

    async fn is_in_session(
        &self,
        subject: &Subject,
        signature: &TokenSignature,
    ) -> Result<bool, StoreError> {
        let key = self.session_key(subject);
        let mut conn = self.conn.clone();
        self.timed(conn.sismember(&key, signature.as_str())).await
    }

    async fn remove_from_session(
        &self,
        subject: &Subject,
        signature: &TokenSignature,
    ) -> Result<bool, StoreError> {
        let key = self.session_key(subject);
        let mut conn = self.conn.clone();
        let removed: i64 = self.timed(conn.srem(&key, signature.as_str())).await?;
        Ok(removed > 0)
    }

    async fn clear_sessions(&self, subject: &Subject) -> Result<(), StoreError> {
        let key = self.session_key(subject);
        let mut conn = self.conn.clone();
        let _: i64 = self.timed(conn.del(&key)).await?;
        Ok(())
    }

    async fn put_code(
        &self,
        key: &CodeKey,
        hashed_code: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = key.code_key();
        let mut conn = self.conn.clone();
        let _: () = self
            .timed(conn.pset_ex(&key, hashed_code, millis(ttl)))
            .await?;
        Ok(())
    }

    async fn get_code(&self, key: &CodeKey) -> Result<Option<String>, StoreError> {
        let key = key.code_key();
        let mut conn = self.conn.clone();
        self.timed(conn.get(&key)).await
    }

    async fn delete_code(&self, key: &CodeKey) -> Result<bool, StoreError> {
        let key = key.code_key();
        let mut conn = self.conn.clone();
        let deleted: i64 = self.timed(conn.del(&key)).await?;
        Ok(deleted > 0)
    }

    async fn increment_attempts(
        &self,
        key: &CodeKey,
        window: Duration,
    ) -> Result<AttemptWindow, StoreError> {
        let mut invocation = self.attempts_incr.prepare_invoke();
        invocation.key(key.attempts_key()).arg(millis(window));

        let mut conn = self.conn.clone();
        let (count, pttl): (i64, i64) = self.timed(invocation.invoke_async(&mut conn)).await?;
        Ok(AttemptWindow {
            count: count.max(0) as u64,
            resets_in: Duration::from_millis(pttl.max(0) as u64),
        })
    }

    async fn clear_attempts(&self, key: &CodeKey) -> Result<(), StoreError> {
        let key = key.attempts_key();
        let mut conn = self.conn.clone();
        let _: i64 = self.timed(conn.del(&key)).await?;
        Ok(())
    }
}
