use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::messages::{Notification, NotificationSink};

/// Keeps every notification it is handed. `set_failing(true)` rejects sends.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: RwLock<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, user_id: &str) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.to_user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend("send(notification)", "message service unavailable"));
        }
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}
