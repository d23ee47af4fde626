use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::cache::FastCache;
use crate::error::CacheError;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process [`FastCache`] with Redis semantics for the commands we use.
/// `set_unavailable(true)` makes every call fail, to exercise degraded paths.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of a set key, for assertions.
    pub async fn members(&self, key: &str) -> Option<BTreeSet<String>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .and_then(|e| match &e.value {
                Value::Set(set) => Some(set.clone()),
                Value::Text(_) => None,
            })
    }

    /// Pushes an entry's expiry into the past.
    pub async fn expire_now(&self, key: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.expires_at = Some(Instant::now());
        }
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn check(&self, op: &'static str) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::backend(op, "connection refused"));
        }
        Ok(())
    }
}

fn wrong_type(op: &'static str) -> CacheError {
    CacheError::backend(op, "WRONGTYPE Operation against a key holding the wrong kind of value")
}

#[async_trait]
impl FastCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check("GET")?;
        let entries = self.entries.read().await;
        match entries.get(key).filter(|e| e.is_live(Instant::now())) {
            None => Ok(None),
            Some(Entry { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type("GET")),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.check("SET")?;
        let entry = Entry {
            value: Value::Text(value.to_string()),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.check("DEL")?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        self.check("SADD")?;
        if members.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(set) => {
                set.extend(members.iter().cloned());
                Ok(())
            }
            Value::Text(_) => Err(wrong_type("SADD")),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        self.check("SISMEMBER")?;
        let entries = self.entries.read().await;
        match entries.get(key).filter(|e| e.is_live(Instant::now())) {
            None => Ok(false),
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type("SISMEMBER")),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.check("EXISTS")?;
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .is_some_and(|e| e.is_live(Instant::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_values_read_as_absent() {
        let cache = InMemoryCache::new();
        cache
            .set("user_brief:u1", "{}", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(cache.exists("user_brief:u1").await.unwrap());

        cache.expire_now("user_brief:u1").await;
        assert!(!cache.exists("user_brief:u1").await.unwrap());
        assert_eq!(cache.get("user_brief:u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_commands_reject_string_keys() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", None).await.unwrap();
        assert!(cache.sadd("k", &["a".to_string()]).await.is_err());
        assert!(cache.sismember("k", "a").await.is_err());
    }

    #[tokio::test]
    async fn unavailable_cache_fails_every_command() {
        let cache = InMemoryCache::new();
        cache.set_unavailable(true);
        assert!(matches!(
            cache.exists("like_task:u1").await,
            Err(CacheError::Backend { op: "EXISTS", .. })
        ));
        cache.set_unavailable(false);
        assert!(!cache.exists("like_task:u1").await.unwrap());
    }
}
