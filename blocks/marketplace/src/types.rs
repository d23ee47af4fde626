use serde::{Deserialize, Serialize};

use errand_atoms::participation::Participation;
use errand_atoms::tasks::Task;
use errand_atoms::users::UserBrief;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

/// Whoever is making the request, as resolved by the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    #[serde(default)]
    pub role: Role,
}

impl Caller {
    pub fn member(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Member,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Publisher of the task, or an admin acting for them.
    pub fn manages(&self, task: &Task) -> bool {
        self.is_admin() || self.user_id == task.publisher_id
    }
}

/// A task as one viewer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    /// Absent when the publisher's profile no longer resolves.
    pub publisher: Option<UserBrief>,
    pub liked: bool,
    pub collected: bool,
    /// The viewer's own participation, if any.
    pub participation: Option<Participation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantEntry {
    #[serde(flatten)]
    pub participation: Participation,
    pub user: UserBrief,
}
