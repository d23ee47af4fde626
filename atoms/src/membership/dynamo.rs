use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use super::model::{MembershipSet, SetKind};
use super::store::MembershipStore;
use crate::dynamo::{get_ss, s, DynamoStore};
use crate::error::StoreError;

const MEMBERSHIP_SK: &str = "MEMBERSHIP";

fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

#[async_trait]
impl MembershipStore for DynamoStore {
    async fn find_membership_set(&self, user_id: &str) -> Result<Option<MembershipSet>, StoreError> {
        let request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(user_pk(user_id)))
            .key("SK", s(MEMBERSHIP_SK))
            .consistent_read(true)
            .send();
        let output = self.call("GetItem(membership)", request).await?;

        Ok(output.item().map(|item| MembershipSet {
            user_id: user_id.to_string(),
            liked_tasks: get_ss(item, SetKind::LikedTasks.attribute()),
            liked_comments: get_ss(item, SetKind::LikedComments.attribute()),
            collected_tasks: get_ss(item, SetKind::CollectedTasks.attribute()),
        }))
    }

    async fn add_member(&self, user_id: &str, kind: SetKind, target_id: &str) -> Result<bool, StoreError> {
        // ADD creates the document on first use.
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(user_pk(user_id)))
            .key("SK", s(MEMBERSHIP_SK))
            .update_expression("ADD #set :ids")
            .condition_expression("attribute_not_exists(#set) OR NOT contains(#set, :id)")
            .expression_attribute_names("#set", kind.attribute())
            .expression_attribute_values(":ids", AttributeValue::Ss(vec![target_id.to_string()]))
            .expression_attribute_values(":id", s(target_id))
            .send();
        Ok(self
            .call_conditional("UpdateItem(membership add)", request)
            .await?
            .is_some())
    }

    async fn remove_member(&self, user_id: &str, kind: SetKind, target_id: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(user_pk(user_id)))
            .key("SK", s(MEMBERSHIP_SK))
            .update_expression("DELETE #set :ids")
            .condition_expression("contains(#set, :id)")
            .expression_attribute_names("#set", kind.attribute())
            .expression_attribute_values(":ids", AttributeValue::Ss(vec![target_id.to_string()]))
            .expression_attribute_values(":id", s(target_id))
            .send();
        Ok(self
            .call_conditional("UpdateItem(membership remove)", request)
            .await?
            .is_some())
    }
}
