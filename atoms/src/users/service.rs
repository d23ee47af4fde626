use std::sync::Arc;

use super::brief::UserBriefCache;
use super::model::ProfilePatch;
use super::store::UserProfiles;
use crate::error::{Error, Result};

/// Profile writes that keep the brief cache honest: write the profile, then
/// drop the cached brief.
#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn UserProfiles>,
    briefs: UserBriefCache,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn UserProfiles>, briefs: UserBriefCache) -> Self {
        Self { profiles, briefs }
    }

    pub async fn update(&self, user_id: &str, patch: &ProfilePatch) -> Result<()> {
        if !self.profiles.update_profile(user_id, patch).await? {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        tracing::info!(user_id, "profile updated");

        if let Err(e) = self.briefs.invalidate(user_id).await {
            tracing::error!(user_id, error = %e, "profile committed but brief invalidation failed");
            return Err(e);
        }
        Ok(())
    }
}
