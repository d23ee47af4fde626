use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Participation, ParticipationStatus, ReviewPatch};
use crate::error::StoreError;

/// Participation documents, keyed by (task, user).
#[async_trait]
pub trait ParticipationStore: Send + Sync {
    async fn find_participation(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<Participation>, StoreError>;

    /// Writes the application when no record exists or the existing one was
    /// given up. Returns `false` when an active or final record is in the way.
    async fn upsert_application(&self, participation: &Participation) -> Result<bool, StoreError>;

    /// Writes `to` only while the stored status is still `from`.
    async fn transition_participation(
        &self,
        task_id: &str,
        user_id: &str,
        from: ParticipationStatus,
        to: ParticipationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Writes review fields while the record is in a reviewable status.
    async fn write_review(
        &self,
        task_id: &str,
        user_id: &str,
        patch: &ReviewPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn find_task_participations(
        &self,
        task_id: &str,
        status: Option<ParticipationStatus>,
    ) -> Result<Vec<Participation>, StoreError>;

    async fn find_user_participations(&self, user_id: &str) -> Result<Vec<Participation>, StoreError>;
}
