use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::membership::{MembershipSet, MembershipStore, SetKind};
use crate::page::Page;
use crate::participation::{Participation, ParticipationStatus, ParticipationStore, ReviewPatch};
use crate::tasks::{Task, TaskCounter, TaskFilter, TaskPatch, TaskSort, TaskStatus, TaskStore};
use crate::users::{ProfilePatch, UserProfile, UserProfiles};

/// Durable Store held in memory. Each guarded write runs under one write
/// lock, which gives the same all-or-nothing behavior as a conditional
/// update on a single document.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: RwLock<HashMap<String, Task>>,
    participations: RwLock<HashMap<(String, String), Participation>>,
    memberships: RwLock<HashMap<String, MembershipSet>>,
    users: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_user(&self, profile: UserProfile) {
        self.users
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    /// Overwrites a task as-is, skipping every guard.
    pub async fn put_task(&self, task: Task) {
        self.tasks.write().await.insert(task.task_id.clone(), task);
    }
}

fn participation_key(task_id: &str, user_id: &str) -> (String, String) {
    (task_id.to_string(), user_id.to_string())
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn find_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks
            .write()
            .await
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn transition_task(
        &self,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(task_id) {
            Some(task) if task.status == from => {
                task.status = to;
                task.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_task_info(
        &self,
        task_id: &str,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(task_id) else {
            return Ok(false);
        };
        if !task.status.is_editable() {
            return Ok(false);
        }
        if let Some(cap) = patch.max_player {
            if cap != 0 && task.player_count > i64::from(cap) {
                return Ok(false);
            }
        }
        patch.apply_to(task, at);
        Ok(true)
    }

    async fn increment_counter(
        &self,
        task_id: &str,
        counter: TaskCounter,
        delta: i64,
    ) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(task_id) else {
            return Ok(false);
        };
        let value = task.counter_mut(counter);
        if *value + delta < 0 {
            return Ok(false);
        }
        *value += delta;
        Ok(true)
    }

    async fn try_add_player(&self, task_id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(task_id) {
            Some(task) if task.status == TaskStatus::Wait && task.has_capacity() => {
                task.player_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_draft_task(&self, task_id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks
            .get(task_id)
            .is_some_and(|t| t.status == TaskStatus::Draft)
        {
            tasks.remove(task_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn find_tasks(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort.sort(&mut tasks);
        Ok(page.slice(tasks))
    }

    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.values().filter(|t| filter.matches(t)).count() as u64)
    }
}

#[async_trait]
impl ParticipationStore for InMemoryStore {
    async fn find_participation(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<Participation>, StoreError> {
        let participations = self.participations.read().await;
        Ok(participations
            .get(&participation_key(task_id, user_id))
            .cloned())
    }

    async fn upsert_application(&self, participation: &Participation) -> Result<bool, StoreError> {
        let mut participations = self.participations.write().await;
        let key = participation_key(&participation.task_id, &participation.user_id);
        if participations
            .get(&key)
            .is_some_and(|p| p.status != ParticipationStatus::GiveUp)
        {
            return Ok(false);
        }
        participations.insert(key, participation.clone());
        Ok(true)
    }

    async fn transition_participation(
        &self,
        task_id: &str,
        user_id: &str,
        from: ParticipationStatus,
        to: ParticipationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut participations = self.participations.write().await;
        match participations.get_mut(&participation_key(task_id, user_id)) {
            Some(p) if p.status == from => {
                p.status = to;
                p.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn write_review(
        &self,
        task_id: &str,
        user_id: &str,
        patch: &ReviewPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut participations = self.participations.write().await;
        match participations.get_mut(&participation_key(task_id, user_id)) {
            Some(p) if p.status.is_reviewable() => {
                patch.apply_to(p, at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_task_participations(
        &self,
        task_id: &str,
        status: Option<ParticipationStatus>,
    ) -> Result<Vec<Participation>, StoreError> {
        let mut found: Vec<Participation> = self
            .participations
            .read()
            .await
            .values()
            .filter(|p| p.task_id == task_id && status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn find_user_participations(&self, user_id: &str) -> Result<Vec<Participation>, StoreError> {
        let mut found: Vec<Participation> = self
            .participations
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_membership_set(&self, user_id: &str) -> Result<Option<MembershipSet>, StoreError> {
        Ok(self.memberships.read().await.get(user_id).cloned())
    }

    async fn add_member(&self, user_id: &str, kind: SetKind, target_id: &str) -> Result<bool, StoreError> {
        let mut memberships = self.memberships.write().await;
        let set = memberships
            .entry(user_id.to_string())
            .or_insert_with(|| MembershipSet::empty(user_id));
        Ok(set.members_mut(kind).insert(target_id.to_string()))
    }

    async fn remove_member(&self, user_id: &str, kind: SetKind, target_id: &str) -> Result<bool, StoreError> {
        let mut memberships = self.memberships.write().await;
        Ok(memberships
            .get_mut(user_id)
            .is_some_and(|set| set.members_mut(kind).remove(target_id)))
    }
}

#[async_trait]
impl UserProfiles for InMemoryStore {
    async fn get_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(profile) => {
                patch.apply_to(profile);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
