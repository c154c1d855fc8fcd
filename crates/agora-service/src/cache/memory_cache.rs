//! In-process cache with the same key and TTL semantics as Redis.

use super::CacheInterface;
use agora_core::{AgoraError, AgoraResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Cache kept in a map. Expired keys are dropped lazily on access.
///
/// Can be switched offline to exercise the degraded paths: every call then
/// fails the way an unreachable Redis would.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    online: AtomicBool,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (`false`) or succeed again (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_online(&self) -> AgoraResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgoraError::Cache("Cache is unreachable".to_string()))
        }
    }
}

#[async_trait]
impl CacheInterface for InMemoryCache {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_raw(&self, key: &str) -> AgoraResult<Option<String>> {
        self.check_online()?;

        let now = Instant::now();
        let mut entries = self.entries.write();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> AgoraResult<()> {
        self.check_online()?;

        let ttl = ttl.max(Duration::from_secs(1));
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AgoraResult<bool> {
        self.check_online()?;
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .remove(key)
            .is_some_and(|entry| entry.expires_at > now))
    }

    async fn exists(&self, key: &str) -> AgoraResult<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> AgoraResult<u64> {
        self.check_online()?;

        let now = Instant::now();
        let mut entries = self.entries.write();
        let matching: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        let mut deleted = 0;
        for key in matching {
            if entries.remove(&key).is_some_and(|entry| entry.expires_at > now) {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Redis-style glob: `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, k));
                p += 1;
            }
            Some(&c) if c == '?' || c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match star {
                Some((star_p, star_k)) => {
                    p = star_p + 1;
                    k = star_k + 1;
                    star = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
