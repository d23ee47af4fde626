use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Participation,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participation => "participation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to_user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    /// Document the message is about (a task id).
    pub about_id: String,
}

/// Message component the engine notifies through.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), StoreError>;
}
