//! User Brief Cache: nickname/avatar/gender/type projections kept in the Fast
//! Cache under `user_brief:{user_id}` for a fixed TTL.
//!
//! No write-through. Profile writers call [`UserBriefCache::invalidate`] and
//! the next [`UserBriefCache::get`] recomputes from the profile collaborator.

use std::sync::Arc;
use std::time::Duration;

use super::model::UserBrief;
use super::store::UserProfiles;
use crate::cache::FastCache;
use crate::error::{Error, Result};

pub const DEFAULT_BRIEF_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct UserBriefCache {
    profiles: Arc<dyn UserProfiles>,
    cache: Arc<dyn FastCache>,
    ttl: Duration,
}

impl UserBriefCache {
    pub fn new(profiles: Arc<dyn UserProfiles>, cache: Arc<dyn FastCache>, ttl: Duration) -> Self {
        Self { profiles, cache, ttl }
    }

    pub fn cache_key(user_id: &str) -> String {
        format!("user_brief:{}", user_id)
    }

    /// Unknown users are `NotFound` and never cached.
    pub async fn get(&self, user_id: &str) -> Result<UserBrief> {
        let key = Self::cache_key(user_id);

        match self.cache.get(&key).await {
            Ok(Some(json)) => match serde_json::from_str::<UserBrief>(&json) {
                Ok(brief) => return Ok(brief),
                Err(e) => tracing::warn!(%key, error = %e, "discarding undecodable user brief"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, error = %e, "user brief cache unavailable, reading profile"),
        }

        let profile = self
            .profiles
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;
        let brief = UserBrief::from(&profile);

        match serde_json::to_string(&brief) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&key, &json, Some(self.ttl)).await {
                    tracing::warn!(%key, error = %e, "failed to cache user brief");
                }
            }
            Err(e) => tracing::warn!(%key, error = %e, "failed to encode user brief"),
        }

        Ok(brief)
    }

    pub async fn invalidate(&self, user_id: &str) -> Result<()> {
        self.cache
            .del(&Self::cache_key(user_id))
            .await
            .map_err(Error::from)
    }
}
