use async_trait::async_trait;

use super::model::{MembershipSet, SetKind};
use crate::error::StoreError;

/// Per-user membership documents. Add and remove are atomic set operations
/// that report whether anything changed.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership_set(&self, user_id: &str) -> Result<Option<MembershipSet>, StoreError>;

    /// `false` when `target_id` was already a member.
    async fn add_member(&self, user_id: &str, kind: SetKind, target_id: &str) -> Result<bool, StoreError>;

    /// `false` when `target_id` was not a member.
    async fn remove_member(&self, user_id: &str, kind: SetKind, target_id: &str) -> Result<bool, StoreError>;
}
