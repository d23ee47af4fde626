use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Task, TaskCounter, TaskFilter, TaskPatch, TaskSort, TaskStatus};
use crate::error::StoreError;
use crate::page::Page;

/// Task documents in the Durable Store. Every mutation is a single-document
/// atomic operation; a `false` return means the guard did not match.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Writes `to` only while the stored status is still `from`.
    async fn transition_task(
        &self,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Applies `patch` while the task is still editable and, when the patch
    /// caps players, while the cap still covers the current player count.
    async fn update_task_info(
        &self,
        task_id: &str,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Adds `delta` to a counter. Decrements never take a counter below zero.
    async fn increment_counter(
        &self,
        task_id: &str,
        counter: TaskCounter,
        delta: i64,
    ) -> Result<bool, StoreError>;

    /// Takes one player slot if the task is open (`wait`) and below capacity.
    async fn try_add_player(&self, task_id: &str) -> Result<bool, StoreError>;

    /// Deletes the task only while it is still a draft.
    async fn delete_draft_task(&self, task_id: &str) -> Result<bool, StoreError>;

    async fn find_tasks(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> Result<Vec<Task>, StoreError>;

    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, StoreError>;
}
