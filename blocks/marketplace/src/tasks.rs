//! Task Lifecycle Manager: draft -> wait -> close | finish, info edits, and
//! the denormalized counters on the task document.

use chrono::Utc;
use std::collections::BTreeSet;

use errand_atoms::error::{Error, Result, StoreError};
use errand_atoms::files::Binding;
use errand_atoms::membership::SetKind;
use errand_atoms::page::{Page, Paginated};
use errand_atoms::participation::ParticipationStatus;
use errand_atoms::tasks::{NewTask, Task, TaskCounter, TaskFilter, TaskPatch, TaskSort, TaskStatus};
use errand_atoms::users::UserBrief;

use crate::deps::Dependencies;
use crate::effects::SideEffects;
use crate::notices;
use crate::types::{Caller, TaskView};

/// Re-reads allowed when a participation moves while its task is closing.
const CLOSE_ATTEMPTS: usize = 3;

/// The task status table. Anything not listed is a state violation.
pub fn is_task_transition(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (TaskStatus::Draft, TaskStatus::Wait)
            | (TaskStatus::Wait, TaskStatus::Close)
            | (TaskStatus::Wait, TaskStatus::Finish)
    )
}

#[derive(Clone)]
pub struct TaskManager {
    deps: Dependencies,
}

impl TaskManager {
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }

    /// Creates a draft owned by the caller and binds its attachments.
    pub async fn create(&self, caller: &Caller, new_task: NewTask) -> Result<Task> {
        new_task.validate()?;
        let task_id = uuid::Uuid::now_v7().to_string();
        self.bind_files(&task_id, &new_task.attachments).await?;

        let task = Task::draft(task_id, caller.user_id.clone(), new_task, Utc::now());
        self.deps.tasks.insert_task(&task).await?;

        tracing::info!(task_id = %task.task_id, publisher_id = %task.publisher_id, "task drafted");
        Ok(task)
    }

    pub async fn get(&self, task_id: &str) -> Result<Task> {
        self.deps
            .tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))
    }

    /// Task with publisher brief and the viewer's own likes, collection and
    /// participation. Drafts exist only for whoever manages them.
    pub async fn view(&self, viewer: &Caller, task_id: &str) -> Result<TaskView> {
        let task = self.get(task_id).await?;
        if task.status == TaskStatus::Draft && !viewer.manages(&task) {
            return Err(Error::NotFound(format!("task {task_id}")));
        }

        let (publisher, liked, collected, participation) = tokio::try_join!(
            self.publisher_brief(&task.publisher_id),
            self.deps
                .memberships
                .is_member(&viewer.user_id, task_id, SetKind::LikedTasks),
            self.deps
                .memberships
                .is_member(&viewer.user_id, task_id, SetKind::CollectedTasks),
            async {
                self.deps
                    .participations
                    .find_participation(task_id, &viewer.user_id)
                    .await
                    .map_err(Error::from)
            },
        )?;

        Ok(TaskView {
            task,
            publisher,
            liked,
            collected,
            participation,
        })
    }

    pub async fn list(
        &self,
        viewer: &Caller,
        mut filter: TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> Result<Paginated<Task>> {
        let own_listing = filter.publisher_id.as_deref() == Some(viewer.user_id.as_str());
        if filter.include_drafts && !own_listing && !viewer.is_admin() {
            filter.include_drafts = false;
        }

        let (items, total) = tokio::try_join!(
            self.deps.tasks.find_tasks(&filter, sort, page),
            self.deps.tasks.count_tasks(&filter),
        )?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn change_status(&self, caller: &Caller, task_id: &str, to: TaskStatus) -> Result<Task> {
        let mut task = self.get(task_id).await?;
        if !caller.manages(&task) {
            return Err(Error::PermissionDenied(format!(
                "only the publisher can change the status of task {task_id}"
            )));
        }
        let from = task.status;
        if !is_task_transition(from, to) {
            return Err(Error::StateViolation(format!(
                "task {task_id} cannot move from {from} to {to}"
            )));
        }
        if to == TaskStatus::Finish {
            let unresolved = self
                .deps
                .participations
                .find_task_participations(task_id, None)
                .await?
                .into_iter()
                .filter(|p| p.status.is_active())
                .count();
            if unresolved > 0 {
                return Err(Error::StateViolation(format!(
                    "task {task_id} still has {unresolved} unresolved participations"
                )));
            }
        }

        let now = Utc::now();
        if !self.deps.tasks.transition_task(task_id, from, to, now).await? {
            return Err(Error::StateViolation(format!("task {task_id} is no longer {from}")));
        }
        task.status = to;
        task.updated_at = now;
        tracing::info!(task_id, %from, %to, "task status changed");

        // On finish this only catches applications that landed after the guard.
        if to.is_terminal() {
            self.close_participations(&task).await?;
        }
        Ok(task)
    }

    /// Edits task info. Attachments added by the patch are bound before the
    /// write; attachments it drops are released after.
    pub async fn edit(&self, caller: &Caller, task_id: &str, patch: &TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("task patch sets no fields".to_string()));
        }
        let mut task = self.get(task_id).await?;
        if !caller.manages(&task) {
            return Err(Error::PermissionDenied(format!(
                "only the publisher can edit task {task_id}"
            )));
        }
        if !task.status.is_editable() {
            return Err(Error::StateViolation(format!(
                "task {task_id} is {} and can no longer be edited",
                task.status
            )));
        }
        patch.validate_against(&task)?;

        let (added, removed) = match &patch.attachments {
            Some(next) => diff_attachments(&task.attachments, next),
            None => (Vec::new(), Vec::new()),
        };
        self.bind_files(task_id, &added).await?;

        let now = Utc::now();
        if !self.deps.tasks.update_task_info(task_id, patch, now).await? {
            return Err(Error::StateViolation(format!(
                "task {task_id} changed during the edit; reload and retry"
            )));
        }
        patch.apply_to(&mut task, now);
        tracing::info!(task_id, added = added.len(), removed = removed.len(), "task info updated");

        let mut effects = SideEffects::default();
        for file_id in &removed {
            match self.deps.files.release(file_id, task_id).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(task_id, file_id, "dropped attachment not owned by task, kept"),
                Err(e) => effects.record::<(), _>("release attachment", Err(e)),
            }
        }
        effects.finish()?;
        Ok(task)
    }

    /// Deletes a draft and releases every file bound to it.
    pub async fn remove(&self, caller: &Caller, task_id: &str) -> Result<()> {
        let task = self.get(task_id).await?;
        if !caller.manages(&task) {
            return Err(Error::PermissionDenied(format!(
                "only the publisher can remove task {task_id}"
            )));
        }
        if task.status != TaskStatus::Draft {
            return Err(Error::StateViolation(format!(
                "task {task_id} is {}; only drafts can be removed",
                task.status
            )));
        }
        if !self.deps.tasks.delete_draft_task(task_id).await? {
            return Err(Error::StateViolation(format!("task {task_id} is no longer a draft")));
        }
        tracing::info!(task_id, "draft removed");

        let mut effects = SideEffects::default();
        match self.deps.files.list_by_owner(task_id, None).await {
            Ok(files) => {
                for file in files {
                    effects.record(
                        "release attachment",
                        self.deps.files.release(&file.file_id, task_id).await,
                    );
                }
            }
            Err(e) => effects.record::<(), _>("list attachments", Err(e)),
        }
        effects.finish()
    }

    /// Best-effort view counter; no caller checks.
    pub async fn add_view(&self, task_id: &str) -> Result<()> {
        if !self
            .deps
            .tasks
            .increment_counter(task_id, TaskCounter::Views, 1)
            .await?
        {
            return Err(Error::NotFound(format!("task {task_id}")));
        }
        Ok(())
    }

    pub async fn change_like(&self, caller: &Caller, task_id: &str, liked: bool) -> Result<()> {
        self.toggle(caller, task_id, SetKind::LikedTasks, TaskCounter::Likes, liked)
            .await
    }

    pub async fn change_collection(&self, caller: &Caller, task_id: &str, collected: bool) -> Result<()> {
        self.toggle(caller, task_id, SetKind::CollectedTasks, TaskCounter::Collects, collected)
            .await
    }

    /// Keeps `comments` in step with the comment component.
    pub async fn adjust_comment_count(&self, task_id: &str, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        if self
            .deps
            .tasks
            .increment_counter(task_id, TaskCounter::Comments, delta)
            .await?
        {
            return Ok(());
        }
        match self.deps.tasks.find_task(task_id).await? {
            None => Err(Error::NotFound(format!("task {task_id}"))),
            Some(task) => Err(Error::StateViolation(format!(
                "task {task_id} has {} comments, cannot apply {delta}",
                task.comments
            ))),
        }
    }

    pub async fn is_liked(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.deps
            .memberships
            .is_member(user_id, task_id, SetKind::LikedTasks)
            .await
    }

    pub async fn is_collected(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.deps
            .memberships
            .is_member(user_id, task_id, SetKind::CollectedTasks)
            .await
    }

    // The membership write decides; the counter only moves after it succeeded.
    async fn toggle(
        &self,
        caller: &Caller,
        task_id: &str,
        kind: SetKind,
        counter: TaskCounter,
        on: bool,
    ) -> Result<()> {
        let task = self.get(task_id).await?;
        if task.status == TaskStatus::Draft {
            return Err(Error::StateViolation(format!("task {task_id} is not published")));
        }

        let delta = if on {
            self.deps.memberships.add(&caller.user_id, task_id, kind).await?;
            1
        } else {
            self.deps.memberships.remove(&caller.user_id, task_id, kind).await?;
            -1
        };

        let mut effects = SideEffects::default();
        match self.deps.tasks.increment_counter(task_id, counter, delta).await {
            Ok(true) => {}
            Ok(false) => effects.fail(
                counter.attribute(),
                format!("counter on task {task_id} did not move by {delta}"),
            ),
            Err(e) => effects.record::<(), _>(counter.attribute(), Err(e)),
        }
        effects.finish()
    }

    async fn bind_files(&self, task_id: &str, file_ids: &[String]) -> Result<()> {
        for file_id in file_ids {
            match self.deps.files.bind_to_owner(file_id, task_id).await? {
                Binding::Bound => {}
                Binding::Missing => return Err(Error::NotFound(format!("file {file_id}"))),
                Binding::Taken => {
                    return Err(Error::PermissionDenied(format!(
                        "file {file_id} is attached elsewhere"
                    )))
                }
            }
        }
        Ok(())
    }

    /// A task whose publisher profile is gone still renders, without the brief.
    async fn publisher_brief(&self, publisher_id: &str) -> Result<Option<UserBrief>> {
        match self.deps.briefs.get(publisher_id).await {
            Ok(brief) => Ok(Some(brief)),
            Err(Error::NotFound(_)) => {
                tracing::warn!(publisher_id, "publisher profile missing");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn close_participations(&self, task: &Task) -> Result<()> {
        let mut effects = SideEffects::default();
        let participations = match self
            .deps
            .participations
            .find_task_participations(&task.task_id, None)
            .await
        {
            Ok(participations) => participations,
            Err(e) => {
                effects.record::<(), _>("load participations", Err(e));
                return effects.finish();
            }
        };

        for participation in participations.into_iter().filter(|p| p.status.is_active()) {
            let user_id = participation.user_id.as_str();
            match self.force_close(&task.task_id, user_id, participation.status).await {
                Ok(true) => {
                    let notice = notices::participation_changed(
                        task,
                        user_id,
                        user_id,
                        ParticipationStatus::Close,
                    );
                    effects.record("notify participant", self.deps.notifications.send(&notice).await);
                }
                Ok(false) => {
                    tracing::debug!(task_id = %task.task_id, user_id, "participation resolved before close");
                }
                Err(e) => effects.record::<(), _>("close participation", Err(e)),
            }
        }
        effects.finish()
    }

    async fn force_close(
        &self,
        task_id: &str,
        user_id: &str,
        mut status: ParticipationStatus,
    ) -> std::result::Result<bool, StoreError> {
        for _ in 0..CLOSE_ATTEMPTS {
            if self
                .deps
                .participations
                .transition_participation(task_id, user_id, status, ParticipationStatus::Close, Utc::now())
                .await?
            {
                return Ok(true);
            }
            match self.deps.participations.find_participation(task_id, user_id).await? {
                Some(current) if current.status.is_active() => status = current.status,
                _ => return Ok(false),
            }
        }
        Ok(false)
    }
}

/// `(added, removed)` between two attachment lists, in list order.
fn diff_attachments(current: &[String], next: &[String]) -> (Vec<String>, Vec<String>) {
    let before: BTreeSet<&String> = current.iter().collect();
    let after: BTreeSet<&String> = next.iter().collect();
    let added = next.iter().filter(|id| !before.contains(id)).cloned().collect();
    let removed = current.iter().filter(|id| !after.contains(id)).cloned().collect();
    (added, removed)
}
