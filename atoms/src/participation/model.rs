use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Highest value accepted for `degree` and `score`.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Wait,
    Refuse,
    Close,
    Running,
    Finish,
    GiveUp,
    Failure,
}

impl ParticipationStatus {
    pub const ALL: [ParticipationStatus; 7] = [
        Self::Wait,
        Self::Refuse,
        Self::Close,
        Self::Running,
        Self::Finish,
        Self::GiveUp,
        Self::Failure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::Refuse => "refuse",
            Self::Close => "close",
            Self::Running => "running",
            Self::Finish => "finish",
            Self::GiveUp => "give_up",
            Self::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Still holding a slot and awaiting resolution.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Wait | Self::Running)
    }

    /// Post-completion states that accept reviews.
    pub fn is_reviewable(self) -> bool {
        matches!(self, Self::Finish | Self::Failure)
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's engagement with one task. There is one document per
/// (task, user); re-applying after `give_up` reactivates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub participation_id: String,
    pub task_id: String,
    pub user_id: String,
    pub status: ParticipationStatus,
    pub note: String,
    /// Publisher-authored.
    pub degree: Option<u8>,
    pub remark: Option<String>,
    /// Participant-authored.
    pub score: Option<u8>,
    pub feedback: Option<String>,
    /// Number of applications, counting re-applications after giving up.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participation {
    pub fn new(
        participation_id: String,
        task_id: String,
        user_id: String,
        status: ParticipationStatus,
        note: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            participation_id,
            task_id,
            user_id,
            status,
            note,
            degree: None,
            remark: None,
            score: None,
            feedback: None,
            attempts: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fresh application on top of a given-up record: same identity and
    /// history, cleared review fields.
    pub fn reapply(&self, status: ParticipationStatus, note: String, now: DateTime<Utc>) -> Self {
        Self {
            status,
            note,
            degree: None,
            remark: None,
            score: None,
            feedback: None,
            attempts: self.attempts + 1,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Review fields; `None` leaves a field untouched, `Some(0)` writes zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReviewPatch {
    pub degree: Option<u8>,
    pub remark: Option<String>,
    pub score: Option<u8>,
    pub feedback: Option<String>,
}

impl ReviewPatch {
    pub fn has_publisher_fields(&self) -> bool {
        self.degree.is_some() || self.remark.is_some()
    }

    pub fn has_participant_fields(&self) -> bool {
        self.score.is_some() || self.feedback.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_publisher_fields() && !self.has_participant_fields()
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [("degree", self.degree), ("score", self.score)] {
            if let Some(value) = value {
                if value > MAX_RATING {
                    return Err(Error::InvalidInput(format!(
                        "{name} must be between 0 and {MAX_RATING}, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn apply_to(&self, participation: &mut Participation, now: DateTime<Utc>) {
        if let Some(degree) = self.degree {
            participation.degree = Some(degree);
        }
        if let Some(remark) = &self.remark {
            participation.remark = Some(remark.clone());
        }
        if let Some(score) = self.score {
            participation.score = Some(score);
        }
        if let Some(feedback) = &self.feedback {
            participation.feedback = Some(feedback.clone());
        }
        participation.updated_at = now;
    }
}
