#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use errand_atoms::error::StoreError;
use errand_atoms::files::{FileKind, FileRef};
use errand_atoms::memory::{InMemoryCache, InMemoryFiles, InMemoryStore, RecordingSink};
use errand_atoms::participation::{Participation, ParticipationStatus, ParticipationStore, ReviewPatch};
use errand_atoms::tasks::{NewTask, Reward, Task, TaskStatus, TaskStore, TaskType};
use errand_atoms::users::brief::DEFAULT_BRIEF_TTL;
use errand_atoms::users::{AccountType, Gender, UserProfile};
use marketplace_block::{Caller, Dependencies, ParticipationManager, TaskManager};

pub const USERS: [&str; 4] = ["publisher", "alice", "bob", "carol"];

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<InMemoryCache>,
    pub files: Arc<InMemoryFiles>,
    pub sink: Arc<RecordingSink>,
    pub deps: Dependencies,
    pub tasks: TaskManager,
    pub participations: ParticipationManager,
}

pub fn profile(user_id: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.to_string(),
        nickname: format!("{user_id} nick"),
        avatar: format!("https://cdn.example/{user_id}.png"),
        gender: Gender::Unknown,
        account_type: AccountType::Personal,
        email: Some(format!("{user_id}@example.com")),
        created_at: Utc::now(),
    }
}

pub fn new_task(max_player: u32, auto_accept: bool) -> NewTask {
    let now = Utc::now();
    NewTask {
        title: "Deliver groceries".to_string(),
        content: "Two bags from the corner shop".to_string(),
        task_type: TaskType::Running,
        reward: Reward::Money { amount: 1500 },
        start_time: now,
        end_time: now + Duration::hours(3),
        max_player,
        auto_accept,
        attachments: Vec::new(),
    }
}

pub fn file(file_id: &str) -> FileRef {
    FileRef {
        file_id: file_id.to_string(),
        owner_id: None,
        kind: FileKind::Image,
        object_key: format!("uploads/{file_id}.png"),
        uploaded_at: Utc::now(),
    }
}

pub fn publisher() -> Caller {
    Caller::member("publisher")
}

pub fn member(user_id: &str) -> Caller {
    Caller::member(user_id)
}

pub async fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let files = Arc::new(InMemoryFiles::new());
    let sink = Arc::new(RecordingSink::new());
    for user_id in USERS {
        store.put_user(profile(user_id)).await;
    }

    let deps = Dependencies::new(
        store.clone(),
        cache.clone(),
        store.clone(),
        files.clone(),
        sink.clone(),
        DEFAULT_BRIEF_TTL,
    );
    Harness {
        store,
        cache,
        files,
        sink,
        tasks: TaskManager::new(deps.clone()),
        participations: ParticipationManager::new(deps.clone()),
        deps,
    }
}

impl Harness {
    pub async fn draft(&self, max_player: u32, auto_accept: bool) -> Task {
        self.tasks
            .create(&publisher(), new_task(max_player, auto_accept))
            .await
            .unwrap()
    }

    pub async fn published(&self, max_player: u32, auto_accept: bool) -> Task {
        let task = self.draft(max_player, auto_accept).await;
        self.tasks
            .change_status(&publisher(), &task.task_id, TaskStatus::Wait)
            .await
            .unwrap()
    }

    pub async fn reload(&self, task_id: &str) -> Task {
        self.tasks.get(task_id).await.unwrap()
    }
}

/// Participation store that lets a competing write land at a chosen point.
pub struct Interleaved {
    pub store: Arc<InMemoryStore>,
    /// Task status forced just before an application is written.
    pub end_task_before_upsert: Option<TaskStatus>,
    /// Application written just after the first task listing is read.
    pub upsert_after_listing: Mutex<Option<Participation>>,
}

impl Interleaved {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            end_task_before_upsert: None,
            upsert_after_listing: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ParticipationStore for Interleaved {
    async fn find_participation(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<Participation>, StoreError> {
        self.store.find_participation(task_id, user_id).await
    }

    async fn upsert_application(&self, participation: &Participation) -> Result<bool, StoreError> {
        if let Some(end) = self.end_task_before_upsert {
            if let Some(mut task) = self.store.find_task(&participation.task_id).await? {
                task.status = end;
                self.store.put_task(task).await;
            }
        }
        self.store.upsert_application(participation).await
    }

    async fn transition_participation(
        &self,
        task_id: &str,
        user_id: &str,
        from: ParticipationStatus,
        to: ParticipationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.store
            .transition_participation(task_id, user_id, from, to, at)
            .await
    }

    async fn write_review(
        &self,
        task_id: &str,
        user_id: &str,
        patch: &ReviewPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.store.write_review(task_id, user_id, patch, at).await
    }

    async fn find_task_participations(
        &self,
        task_id: &str,
        status: Option<ParticipationStatus>,
    ) -> Result<Vec<Participation>, StoreError> {
        let found = self.store.find_task_participations(task_id, status).await?;
        if let Some(late) = self.upsert_after_listing.lock().await.take() {
            self.store.upsert_application(&late).await?;
        }
        Ok(found)
    }

    async fn find_user_participations(&self, user_id: &str) -> Result<Vec<Participation>, StoreError> {
        self.store.find_user_participations(user_id).await
    }
}
