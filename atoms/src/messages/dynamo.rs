use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;

use super::model::{Notification, NotificationSink};
use crate::dynamo::{s, time, DynamoStore};
use crate::error::StoreError;

/// Messages land in the recipient's inbox partition.
#[async_trait]
impl NotificationSink for DynamoStore {
    async fn send(&self, notification: &Notification) -> Result<(), StoreError> {
        let message_id = uuid::Uuid::now_v7().to_string();
        let request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", s(format!("USER#{}", notification.to_user_id)))
            .item("SK", s(format!("MESSAGE#{}", message_id)))
            .item("message_id", s(message_id.clone()))
            .item("kind", s(notification.kind.as_str()))
            .item("title", s(notification.title.clone()))
            .item("content", s(notification.content.clone()))
            .item("about_id", s(notification.about_id.clone()))
            .item("read", AttributeValue::Bool(false))
            .item("created_at", time(&Utc::now()))
            .send();
        self.call("PutItem(message)", request).await?;
        Ok(())
    }
}
