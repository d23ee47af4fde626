//! Redis implementation of [`FastCache`] over a `deadpool-redis` pool.

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;

use super::FastCache;
use crate::error::CacheError;

#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    timeout: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Builds the pool from a `redis://` URL. Connections are opened lazily.
    pub fn from_url(redis_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::backend("create_pool", e))?;
        Ok(Self::new(pool, timeout))
    }

    /// Checks out a connection and runs one command under the cache deadline.
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T, CacheError>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let work = async {
            let connection = self
                .pool
                .get()
                .await
                .map_err(|e| CacheError::backend(op, e))?;
            command(connection)
                .await
                .map_err(|e| CacheError::backend(op, e))
        };
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(op)),
        }
    }
}

#[async_trait]
impl FastCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.run("GET", |mut conn| async move { conn.get(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        match ttl {
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                self.run("SETEX", |mut conn| async move {
                    conn.set_ex::<_, _, ()>(key, value, seconds).await
                })
                .await
            }
            None => {
                self.run("SET", |mut conn| async move {
                    conn.set::<_, _, ()>(key, value).await
                })
                .await
            }
        }
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.run("DEL", |mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        if members.is_empty() {
            return Ok(());
        }
        self.run("SADD", |mut conn| async move {
            conn.sadd::<_, _, ()>(key, members).await
        })
        .await
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        self.run("SISMEMBER", |mut conn| async move {
            conn.sismember(key, member).await
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.run("EXISTS", |mut conn| async move { conn.exists(key).await })
            .await
    }
}
