//! Fast Cache seam. The cache only accelerates reads; the Durable Store stays
//! authoritative, and only the component owning a key family writes it.

pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

pub use self::redis::RedisCache;

#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a string value; `ttl = None` keeps it until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), CacheError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}
