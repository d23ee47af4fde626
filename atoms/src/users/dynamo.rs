use async_trait::async_trait;

use super::model::{AccountType, Gender, ProfilePatch, UserProfile};
use super::store::UserProfiles;
use crate::dynamo::{get_s, get_time, s, DynamoStore, UpdateBuilder};
use crate::error::StoreError;

fn user_key(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

#[async_trait]
impl UserProfiles for DynamoStore {
    async fn get_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let pk = user_key(user_id);
        let request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(pk.clone()))
            .key("SK", s(pk))
            .send();
        let output = self.call("GetItem(user)", request).await?;

        Ok(output.item().map(|item| {
            let email = get_s(item, "user_email");
            let mut nickname = get_s(item, "nickname").unwrap_or_default();
            if nickname.trim().is_empty() {
                nickname = email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .unwrap_or("User")
                    .to_string();
            }
            UserProfile {
                user_id: user_id.to_string(),
                nickname,
                avatar: get_s(item, "avatar").unwrap_or_default(),
                gender: Gender::parse(&get_s(item, "gender").unwrap_or_default()),
                account_type: AccountType::parse(&get_s(item, "account_type").unwrap_or_default()),
                email,
                created_at: get_time(item, "user_created_at").unwrap_or_default(),
            }
        }))
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<bool, StoreError> {
        let mut update = UpdateBuilder::default();
        if let Some(nickname) = &patch.nickname {
            update.set("nickname", s(nickname.clone()));
        }
        if let Some(avatar) = &patch.avatar {
            update.set("avatar", s(avatar.clone()));
        }
        if let Some(gender) = patch.gender {
            update.set("gender", s(gender.as_str()));
        }
        if let Some(account_type) = patch.account_type {
            update.set("account_type", s(account_type.as_str()));
        }
        if patch.is_empty() {
            return Ok(self.get_by_id(user_id).await?.is_some());
        }

        let pk = user_key(user_id);
        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(pk.clone()))
            .key("SK", s(pk))
            .update_expression(update.expression())
            .condition_expression("attribute_exists(PK)");
        for (k, v) in update.names {
            builder = builder.expression_attribute_names(k, v);
        }
        for (k, v) in update.values {
            builder = builder.expression_attribute_values(k, v);
        }

        Ok(self
            .call_conditional("UpdateItem(user)", builder.send())
            .await?
            .is_some())
    }
}
