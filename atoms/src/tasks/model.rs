use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Task lifecycle: draft -> wait -> close | finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    Wait,
    Close,
    Finish,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Draft, Self::Wait, Self::Close, Self::Finish];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Wait => "wait",
            Self::Close => "close",
            Self::Finish => "finish",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Close | Self::Finish)
    }

    /// Info edits are allowed until the task terminates.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Wait)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Running,
    Questionnaire,
    Info,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Questionnaire => "questionnaire",
            Self::Info => "info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::Running, Self::Questionnaire, Self::Info]
            .into_iter()
            .find(|t| t.as_str() == value)
    }
}

/// What a participant earns. Numeric amounts are in minor units (cents / points).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reward {
    None,
    Money { amount: u64 },
    Points { amount: u64 },
    Object { description: String },
}

impl Reward {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Money { .. } => "money",
            Self::Points { .. } => "points",
            Self::Object { .. } => "object",
        }
    }

    /// Numeric value for ordered kinds; objects and `None` have none.
    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::Money { amount } | Self::Points { amount } => Some(*amount),
            Self::None | Self::Object { .. } => None,
        }
    }

    pub fn from_parts(kind: &str, amount: Option<u64>, description: Option<String>) -> Option<Self> {
        match kind {
            "none" => Some(Self::None),
            "money" => amount.map(|amount| Self::Money { amount }),
            "points" => amount.map(|amount| Self::Points { amount }),
            "object" => description.map(|description| Self::Object { description }),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Money { amount: 0 } | Self::Points { amount: 0 } => Err(Error::InvalidInput(
                format!("{} reward must be greater than zero", self.kind()),
            )),
            Self::Object { description } if description.trim().is_empty() => Err(
                Error::InvalidInput("object reward needs a description".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// The five denormalized counters on a task document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCounter {
    Views,
    Likes,
    Collects,
    Comments,
    Players,
}

impl TaskCounter {
    pub fn attribute(self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Likes => "likes",
            Self::Collects => "collects",
            Self::Comments => "comments",
            Self::Players => "player_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub publisher_id: String,
    pub title: String,
    pub content: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub reward: Reward,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// 0 means unlimited.
    pub max_player: u32,
    pub auto_accept: bool,
    /// File ids bound to this task.
    #[serde(default)]
    pub attachments: Vec<String>,
    pub views: i64,
    pub likes: i64,
    pub collects: i64,
    pub comments: i64,
    pub player_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh draft owned by `publisher_id`.
    pub fn draft(task_id: String, publisher_id: String, new_task: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            task_id,
            publisher_id,
            title: new_task.title,
            content: new_task.content,
            task_type: new_task.task_type,
            status: TaskStatus::Draft,
            reward: new_task.reward,
            start_time: new_task.start_time,
            end_time: new_task.end_time,
            max_player: new_task.max_player,
            auto_accept: new_task.auto_accept,
            attachments: new_task.attachments,
            views: 0,
            likes: 0,
            collects: 0,
            comments: 0,
            player_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.max_player == 0 || self.player_count < i64::from(self.max_player)
    }

    pub fn counter(&self, counter: TaskCounter) -> i64 {
        match counter {
            TaskCounter::Views => self.views,
            TaskCounter::Likes => self.likes,
            TaskCounter::Collects => self.collects,
            TaskCounter::Comments => self.comments,
            TaskCounter::Players => self.player_count,
        }
    }

    pub fn counter_mut(&mut self, counter: TaskCounter) -> &mut i64 {
        match counter {
            TaskCounter::Views => &mut self.views,
            TaskCounter::Likes => &mut self.likes,
            TaskCounter::Collects => &mut self.collects,
            TaskCounter::Comments => &mut self.comments,
            TaskCounter::Players => &mut self.player_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub task_type: TaskType,
    pub reward: Reward,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub max_player: u32,
    #[serde(default)]
    pub auto_accept: bool,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("task title is empty".to_string()));
        }
        validate_window(self.start_time, self.end_time)?;
        self.reward.validate()
    }
}

pub(crate) fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), Error> {
    if start >= end {
        return Err(Error::InvalidInput(format!(
            "task window starts at {start} but ends at {end}"
        )));
    }
    Ok(())
}

/// Partial edit of task info. `None` means "leave as is"; every present
/// field is written, including zero values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub reward: Option<Reward>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub max_player: Option<u32>,
    pub auto_accept: Option<bool>,
    pub attachments: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(content) = &self.content {
            task.content = content.clone();
        }
        if let Some(reward) = &self.reward {
            task.reward = reward.clone();
        }
        if let Some(start_time) = self.start_time {
            task.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            task.end_time = end_time;
        }
        if let Some(max_player) = self.max_player {
            task.max_player = max_player;
        }
        if let Some(auto_accept) = self.auto_accept {
            task.auto_accept = auto_accept;
        }
        if let Some(attachments) = &self.attachments {
            task.attachments = attachments.clone();
        }
        task.updated_at = now;
    }

    /// Checks the patch against the current task. Ordering rules only bind
    /// once the task has left draft.
    pub fn validate_against(&self, task: &Task) -> Result<(), Error> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidInput("task title is empty".to_string()));
            }
        }
        validate_window(
            self.start_time.unwrap_or(task.start_time),
            self.end_time.unwrap_or(task.end_time),
        )?;

        if let Some(max_player) = self.max_player {
            let limit = if max_player == 0 { i64::MAX } else { i64::from(max_player) };
            if limit < task.player_count {
                return Err(Error::StateViolation(format!(
                    "task {} already has {} players, cannot cap at {max_player}",
                    task.task_id, task.player_count
                )));
            }
            let lowered = match (task.max_player, max_player) {
                (_, 0) => false,
                (0, _) => true,
                (current, requested) => requested < current,
            };
            if lowered && task.status != TaskStatus::Draft {
                return Err(Error::StateViolation(format!(
                    "max_player of published task {} can only be raised",
                    task.task_id
                )));
            }
        }

        if let Some(reward) = &self.reward {
            reward.validate()?;
            if task.status != TaskStatus::Draft {
                if reward.kind() != task.reward.kind() {
                    return Err(Error::StateViolation(format!(
                        "reward kind of published task {} cannot change",
                        task.task_id
                    )));
                }
                if let (Some(current), Some(requested)) = (task.reward.amount(), reward.amount()) {
                    if requested < current {
                        return Err(Error::StateViolation(format!(
                            "reward of published task {} can only be raised ({current} -> {requested})",
                            task.task_id
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Find filter over tasks. Drafts are excluded unless `include_drafts` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub publisher_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub include_drafts: bool,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if task.status == TaskStatus::Draft && !self.include_drafts {
            return false;
        }
        self.publisher_id
            .as_deref()
            .map_or(true, |p| p == task.publisher_id)
            && self.status.map_or(true, |s| s == task.status)
            && self.task_type.map_or(true, |t| t == task.task_type)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSort {
    #[default]
    Newest,
    Oldest,
    MostViewed,
    EndingSoon,
}

impl TaskSort {
    pub fn sort(self, tasks: &mut [Task]) {
        match self {
            Self::Newest => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            Self::Oldest => tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            Self::MostViewed => tasks.sort_by(|a, b| {
                b.views.cmp(&a.views).then_with(|| b.created_at.cmp(&a.created_at))
            }),
            Self::EndingSoon => tasks.sort_by(|a, b| a.end_time.cmp(&b.end_time)),
        }
    }
}
