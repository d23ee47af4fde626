//! Participation Manager: one record per (task, user), moved through
//! wait / running / refuse / finish / failure / give_up by the publisher or
//! the participant, with player-count and notification side effects.

use chrono::Utc;
use futures::future::try_join_all;

use errand_atoms::error::{Error, Result};
use errand_atoms::page::{Page, Paginated};
use errand_atoms::participation::{Participation, ParticipationStatus, ReviewPatch};
use errand_atoms::tasks::{Task, TaskCounter, TaskStatus};

use crate::deps::Dependencies;
use crate::effects::SideEffects;
use crate::notices;
use crate::types::{Caller, ParticipantEntry};

/// Who may request a participation transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Publisher,
    Participant,
}

/// The participation status table. `close` is only reached through the
/// task closing, never requested directly.
pub fn participation_actor(from: ParticipationStatus, to: ParticipationStatus) -> Option<Actor> {
    use ParticipationStatus::*;
    match (from, to) {
        (Wait, Running) | (Wait, Refuse) | (Running, Finish) | (Running, Failure) => {
            Some(Actor::Publisher)
        }
        (Wait, GiveUp) | (Running, GiveUp) => Some(Actor::Participant),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ParticipationManager {
    deps: Dependencies,
}

impl ParticipationManager {
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }

    /// Applies to an open task, or re-applies after giving up. Lands in
    /// `running` when the task auto-accepts, `wait` otherwise.
    pub async fn apply(&self, caller: &Caller, task_id: &str, note: &str) -> Result<Participation> {
        if caller.is_admin() {
            return Err(Error::PermissionDenied("admins do not take part in tasks".to_string()));
        }
        let task = self.task(task_id).await?;
        if task.publisher_id == caller.user_id {
            return Err(Error::PermissionDenied(format!(
                "publisher cannot apply to own task {task_id}"
            )));
        }
        if task.status != TaskStatus::Wait {
            return Err(Error::StateViolation(format!(
                "task {task_id} is {} and not accepting applications",
                task.status
            )));
        }

        let existing = self
            .deps
            .participations
            .find_participation(task_id, &caller.user_id)
            .await?;
        if let Some(existing) = &existing {
            if existing.status != ParticipationStatus::GiveUp {
                return Err(Error::Conflict(format!(
                    "user {} already has a {} participation in task {task_id}",
                    caller.user_id, existing.status
                )));
            }
        }
        if !task.has_capacity() {
            return Err(Error::Conflict(format!("task {task_id} is full")));
        }
        if !self.deps.tasks.try_add_player(task_id).await? {
            return Err(Error::Conflict(format!(
                "task {task_id} is full or no longer open"
            )));
        }

        let status = if task.auto_accept {
            ParticipationStatus::Running
        } else {
            ParticipationStatus::Wait
        };
        let now = Utc::now();
        let record = match &existing {
            Some(previous) => previous.reapply(status, note.to_string(), now),
            None => Participation::new(
                uuid::Uuid::now_v7().to_string(),
                task_id.to_string(),
                caller.user_id.clone(),
                status,
                note.to_string(),
                now,
            ),
        };

        let written = self.deps.participations.upsert_application(&record).await;
        if !matches!(written, Ok(true)) {
            self.release_slot(task_id).await;
        }
        if !written? {
            return Err(Error::Conflict(format!(
                "user {} applied to task {task_id} concurrently",
                caller.user_id
            )));
        }

        // The task may have closed or finished between the slot and the write,
        // after its cascade already ran.
        let current = self.task(task_id).await?;
        if current.status != TaskStatus::Wait {
            self.withdraw(&record).await;
            return Err(Error::StateViolation(format!(
                "task {task_id} became {} while the application was written",
                current.status
            )));
        }

        tracing::info!(task_id, user_id = %caller.user_id, %status, attempts = record.attempts, "participation applied");
        Ok(record)
    }

    /// Moves a participation along the status table and notifies the
    /// counterpart.
    pub async fn change_status(
        &self,
        caller: &Caller,
        task_id: &str,
        participant_id: &str,
        to: ParticipationStatus,
    ) -> Result<Participation> {
        let task = self.task(task_id).await?;
        let mut participation = self.participation(task_id, participant_id).await?;
        let from = participation.status;

        let actor = participation_actor(from, to).ok_or_else(|| {
            Error::StateViolation(format!(
                "participation of {participant_id} in task {task_id} cannot move from {from} to {to}"
            ))
        })?;
        if actor == Actor::Publisher && task.status.is_terminal() {
            return Err(Error::StateViolation(format!(
                "task {task_id} is {}; its participations can no longer move",
                task.status
            )));
        }
        let allowed = match actor {
            Actor::Publisher => caller.manages(&task),
            Actor::Participant => caller.user_id == participant_id,
        };
        if !allowed {
            return Err(Error::PermissionDenied(format!(
                "{} cannot move participation of {participant_id} to {to}",
                caller.user_id
            )));
        }

        let now = Utc::now();
        if !self
            .deps
            .participations
            .transition_participation(task_id, participant_id, from, to, now)
            .await?
        {
            return Err(Error::StateViolation(format!(
                "participation of {participant_id} in task {task_id} is no longer {from}"
            )));
        }
        participation.status = to;
        participation.updated_at = now;
        tracing::info!(task_id, participant_id, %from, %to, "participation status changed");

        let mut effects = SideEffects::default();
        if to == ParticipationStatus::GiveUp {
            match self
                .deps
                .tasks
                .increment_counter(task_id, TaskCounter::Players, -1)
                .await
            {
                Ok(true) => {}
                Ok(false) => effects.fail("player_count", format!("task {task_id} had no player to release")),
                Err(e) => effects.record::<(), _>("player_count", Err(e)),
            }
        }
        let recipient = match actor {
            Actor::Publisher => participant_id,
            Actor::Participant => task.publisher_id.as_str(),
        };
        let notice = notices::participation_changed(&task, recipient, participant_id, to);
        effects.record("notify", self.deps.notifications.send(&notice).await);
        effects.finish()?;

        Ok(participation)
    }

    /// Post-completion review. The publisher writes degree/remark, the
    /// participant writes score/feedback, never both in one call.
    pub async fn review(
        &self,
        caller: &Caller,
        task_id: &str,
        participant_id: &str,
        patch: &ReviewPatch,
    ) -> Result<Participation> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("review sets no fields".to_string()));
        }
        if patch.has_publisher_fields() && patch.has_participant_fields() {
            return Err(Error::PermissionDenied(
                "publisher and participant review fields cannot be written together".to_string(),
            ));
        }
        patch.validate()?;

        let task = self.task(task_id).await?;
        let mut participation = self.participation(task_id, participant_id).await?;
        let allowed = if patch.has_publisher_fields() {
            caller.manages(&task)
        } else {
            caller.user_id == participant_id
        };
        if !allowed {
            return Err(Error::PermissionDenied(format!(
                "{} cannot write these review fields for {participant_id}",
                caller.user_id
            )));
        }
        if !participation.status.is_reviewable() {
            return Err(Error::StateViolation(format!(
                "participation of {participant_id} is {} and cannot be reviewed yet",
                participation.status
            )));
        }

        let now = Utc::now();
        if !self
            .deps
            .participations
            .write_review(task_id, participant_id, patch, now)
            .await?
        {
            return Err(Error::StateViolation(format!(
                "participation of {participant_id} in task {task_id} changed during review"
            )));
        }
        patch.apply_to(&mut participation, now);
        Ok(participation)
    }

    pub async fn get(&self, caller: &Caller, task_id: &str, participant_id: &str) -> Result<Participation> {
        let task = self.task(task_id).await?;
        if !caller.manages(&task) && caller.user_id != participant_id {
            return Err(Error::PermissionDenied(format!(
                "{} cannot read participation of {participant_id}",
                caller.user_id
            )));
        }
        self.participation(task_id, participant_id).await
    }

    /// Participants of a task with their user briefs, oldest application first.
    pub async fn list_for_task(
        &self,
        caller: &Caller,
        task_id: &str,
        status: Option<ParticipationStatus>,
        page: Page,
    ) -> Result<Paginated<ParticipantEntry>> {
        let task = self.task(task_id).await?;
        if !caller.manages(&task) {
            return Err(Error::PermissionDenied(format!(
                "only the publisher can list participants of task {task_id}"
            )));
        }

        let all = self
            .deps
            .participations
            .find_task_participations(task_id, status)
            .await?;
        let total = all.len() as u64;
        let entries = try_join_all(page.slice(all).into_iter().map(|participation| async move {
            let user = self.deps.briefs.get(&participation.user_id).await?;
            Ok::<_, Error>(ParticipantEntry { participation, user })
        }))
        .await?;

        Ok(Paginated::new(entries, total, page))
    }

    /// A user's own participations, most recently updated first.
    pub async fn list_for_user(
        &self,
        caller: &Caller,
        user_id: &str,
        page: Page,
    ) -> Result<Paginated<Participation>> {
        if caller.user_id != user_id && !caller.is_admin() {
            return Err(Error::PermissionDenied(format!(
                "{} cannot list participations of {user_id}",
                caller.user_id
            )));
        }
        let all = self.deps.participations.find_user_participations(user_id).await?;
        let total = all.len() as u64;
        Ok(Paginated::new(page.slice(all), total, page))
    }

    async fn task(&self, task_id: &str) -> Result<Task> {
        self.deps
            .tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))
    }

    async fn participation(&self, task_id: &str, user_id: &str) -> Result<Participation> {
        self.deps
            .participations
            .find_participation(task_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("participation of {user_id} in task {task_id}")))
    }

    // Close an application that landed on a task that stopped taking them.
    async fn withdraw(&self, record: &Participation) {
        let task_id = record.task_id.as_str();
        let user_id = record.user_id.as_str();
        match self
            .deps
            .participations
            .transition_participation(task_id, user_id, record.status, ParticipationStatus::Close, Utc::now())
            .await
        {
            Ok(true) => tracing::info!(task_id, user_id, "late application closed"),
            Ok(false) => tracing::debug!(task_id, user_id, "late application already resolved"),
            Err(e) => tracing::error!(task_id, user_id, error = %e, "failed to close late application"),
        }
        self.release_slot(task_id).await;
    }

    // Undo the slot taken by an application that did not stick.
    async fn release_slot(&self, task_id: &str) {
        match self
            .deps
            .tasks
            .increment_counter(task_id, TaskCounter::Players, -1)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::error!(task_id, "player slot already released"),
            Err(e) => tracing::error!(task_id, error = %e, "failed to release player slot"),
        }
    }
}
