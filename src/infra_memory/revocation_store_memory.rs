use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct SessionSet {
    members: HashSet<String>,
    expires_at: Instant,
}

struct Counter {
    count: u64,
    expires_at: Instant,
}

const PURGE_EVERY_WRITES: u64 = 256;

/// In-process `RevocationStore` with the same TTL semantics as the Redis one.
/// Expired entries read as absent. A read drops the expired key it hit, and
/// every `PURGE_EVERY_WRITES` writes a full purge runs over all maps.
#[derive(Default)]
pub struct MemoryRevocationStore {
    blacklist: DashMap<String, Instant>,
    sessions: DashMap<Subject, SessionSet>,
    codes: DashMap<String, (String, Instant)>,
    attempts: DashMap<String, Counter>,
    writes: AtomicU64,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.blacklist.retain(|_, expires_at| *expires_at > now);
        self.sessions.retain(|_, set| set.expires_at > now);
        self.codes.retain(|_, (_, expires_at)| *expires_at > now);
        self.attempts.retain(|_, counter| counter.expires_at > now);
    }

    /// Must be called with no map guard held.
    fn note_write(&self) {
        let n = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if n % PURGE_EVERY_WRITES == 0 {
            self.purge_expired();
        }
    }

    fn write_session(&self, subject: &Subject, entries: &[SessionEntry], replace: bool) {
        self.note_write();
        let now = Instant::now();
        let ttl = entries.iter().map(|e| e.ttl).max().unwrap_or(Duration::ZERO);
        let mut set = self.sessions.entry(subject.clone()).or_insert_with(|| SessionSet {
            members: HashSet::new(),
            expires_at: now,
        });
        if replace || set.expires_at <= now {
            set.members.clear();
            set.expires_at = now;
        }
        set.members
            .extend(entries.iter().map(|e| e.signature.as_str().to_string()));
        if set.expires_at < now + ttl {
            set.expires_at = now + ttl;
        }
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn blacklist(
        &self,
        signature: &TokenSignature,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.note_write();
        self.blacklist
            .insert(signature.as_str().to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_blacklisted(&self, signature: &TokenSignature) -> Result<bool, StoreError> {
        let now = Instant::now();
        let live = matches!(
            self.blacklist.get(signature.as_str()).map(|e| *e.value()),
            Some(expires_at) if expires_at > now
        );
        if !live {
            self.blacklist.remove_if(signature.as_str(), |_, exp| *exp <= now);
        }
        Ok(live)
    }

    async fn add_to_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
    ) -> Result<(), StoreError> {
        self.write_session(subject, entries, false);
        Ok(())
    }

    async fn replace_session(
        &self,
        subject: &Subject,
        entries: &[SessionEntry],
    ) -> Result<(), StoreError> {
        self.write_session(subject, entries, true);
        Ok(())
    }

    async fn is_in_session(
        &self,
        subject: &Subject,
        signature: &TokenSignature,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let live = self
            .sessions
            .get(subject)
            .map(|set| (set.expires_at > now).then(|| set.members.contains(signature.as_str())));
        match live {
            Some(Some(found)) => Ok(found),
            Some(None) => {
                self.sessions.remove_if(subject, |_, set| set.expires_at <= now);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn remove_from_session(
        &self,
        subject: &Subject,
        signature: &TokenSignature,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.sessions.get_mut(subject) {
            Some(mut set) if set.expires_at > now => Ok(set.members.remove(signature.as_str())),
            _ => Ok(false),
        }
    }

    async fn clear_sessions(&self, subject: &Subject) -> Result<(), StoreError> {
        self.sessions.remove(subject);
        Ok(())
    }

    async fn put_code(
        &self,
        key: &CodeKey,
        hashed_code: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.note_write();
        self.codes.insert(
            key.code_key(),
            (hashed_code.to_string(), Instant::now() + ttl),
        );
        Ok(())
    }

    async fn get_code(&self, key: &CodeKey) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let code_key = key.code_key();
        let live = self
            .codes
            .get(&code_key)
            .map(|e| (e.value().1 > now).then(|| e.value().0.clone()));
        match live {
            Some(Some(hash)) => Ok(Some(hash)),
            Some(None) => {
                self.codes.remove_if(&code_key, |_, (_, expires_at)| *expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_code(&self, key: &CodeKey) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(matches!(
            self.codes.remove(&key.code_key()),
            Some((_, (_, expires_at))) if expires_at > now
        ))
    }

    async fn increment_attempts(
        &self,
        key: &CodeKey,
        window: Duration,
    ) -> Result<AttemptWindow, StoreError> {
        self.note_write();
        let now = Instant::now();
        let mut counter = self
            .attempts
            .entry(key.attempts_key())
            .or_insert_with(|| Counter {
                count: 0,
                expires_at: now + window,
            });
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + window;
        }
        counter.count += 1;
        Ok(AttemptWindow {
            count: counter.count,
            resets_in: counter.expires_at - now,
        })
    }

    async fn clear_attempts(&self, key: &CodeKey) -> Result<(), StoreError> {
        self.attempts.remove(&key.attempts_key());
        Ok(())
    }
}
