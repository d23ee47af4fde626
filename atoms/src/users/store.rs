use async_trait::async_trait;

use super::model::{ProfilePatch, UserProfile};
use crate::error::StoreError;

/// User profile collaborator.
#[async_trait]
pub trait UserProfiles: Send + Sync {
    async fn get_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// `false` when the user does not exist.
    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<bool, StoreError>;
}
