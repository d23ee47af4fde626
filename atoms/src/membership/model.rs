use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The three per-user membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetKind {
    LikedTasks,
    LikedComments,
    CollectedTasks,
}

impl SetKind {
    /// Attribute holding the set on the membership document.
    pub fn attribute(self) -> &'static str {
        match self {
            Self::LikedTasks => "liked_tasks",
            Self::LikedComments => "liked_comments",
            Self::CollectedTasks => "collected_tasks",
        }
    }

    /// Prefix of the cache set `{prefix}:{user_id}`.
    pub fn cache_prefix(self) -> &'static str {
        match self {
            Self::LikedTasks => "like_task",
            Self::LikedComments => "like_comment",
            Self::CollectedTasks => "collect_task",
        }
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSet {
    pub user_id: String,
    pub liked_tasks: BTreeSet<String>,
    pub liked_comments: BTreeSet<String>,
    pub collected_tasks: BTreeSet<String>,
}

impl MembershipSet {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn members(&self, kind: SetKind) -> &BTreeSet<String> {
        match kind {
            SetKind::LikedTasks => &self.liked_tasks,
            SetKind::LikedComments => &self.liked_comments,
            SetKind::CollectedTasks => &self.collected_tasks,
        }
    }

    pub fn members_mut(&mut self, kind: SetKind) -> &mut BTreeSet<String> {
        match kind {
            SetKind::LikedTasks => &mut self.liked_tasks,
            SetKind::LikedComments => &mut self.liked_comments,
            SetKind::CollectedTasks => &mut self.collected_tasks,
        }
    }
}
