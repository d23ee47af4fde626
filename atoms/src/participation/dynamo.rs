use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Participation, ParticipationStatus, ReviewPatch};
use super::store::ParticipationStore;
use crate::dynamo::{
    describe, get_n, get_s, n, require_s, require_time, s, time, DynamoStore, Item, UpdateBuilder,
};
use crate::error::StoreError;

fn task_pk(task_id: &str) -> String {
    format!("TASK#{}", task_id)
}

fn player_sk(user_id: &str) -> String {
    format!("PLAYER#{}", user_id)
}

fn user_gsi_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

fn participation_to_item(p: &Participation) -> Item {
    let mut item = Item::new();
    item.insert("PK".to_string(), s(task_pk(&p.task_id)));
    item.insert("SK".to_string(), s(player_sk(&p.user_id)));
    item.insert("GSI1PK".to_string(), s(user_gsi_pk(&p.user_id)));
    item.insert("GSI1SK".to_string(), s(format!("PLAYER#{}", p.task_id)));
    item.insert("participation_id".to_string(), s(p.participation_id.clone()));
    item.insert("task_id".to_string(), s(p.task_id.clone()));
    item.insert("user_id".to_string(), s(p.user_id.clone()));
    item.insert("status".to_string(), s(p.status.as_str()));
    item.insert("note".to_string(), s(p.note.clone()));
    if let Some(degree) = p.degree {
        item.insert("degree".to_string(), n(degree));
    }
    if let Some(remark) = &p.remark {
        item.insert("remark".to_string(), s(remark.clone()));
    }
    if let Some(score) = p.score {
        item.insert("score".to_string(), n(score));
    }
    if let Some(feedback) = &p.feedback {
        item.insert("feedback".to_string(), s(feedback.clone()));
    }
    item.insert("attempts".to_string(), n(p.attempts));
    item.insert("created_at".to_string(), time(&p.created_at));
    item.insert("updated_at".to_string(), time(&p.updated_at));
    item
}

fn participation_from_item(item: &Item) -> Result<Participation, StoreError> {
    let status = require_s(item, "status")?;
    let status = ParticipationStatus::parse(&status)
        .ok_or_else(|| StoreError::malformed(describe(item), format!("unknown status {status}")))?;

    Ok(Participation {
        participation_id: require_s(item, "participation_id")?,
        task_id: require_s(item, "task_id")?,
        user_id: require_s(item, "user_id")?,
        status,
        note: get_s(item, "note").unwrap_or_default(),
        degree: get_n(item, "degree"),
        remark: get_s(item, "remark"),
        score: get_n(item, "score"),
        feedback: get_s(item, "feedback"),
        attempts: get_n(item, "attempts").unwrap_or(1),
        created_at: require_time(item, "created_at")?,
        updated_at: require_time(item, "updated_at")?,
    })
}

fn decode_all(items: &[Item]) -> Result<Vec<Participation>, StoreError> {
    items.iter().map(participation_from_item).collect()
}

#[async_trait]
impl ParticipationStore for DynamoStore {
    async fn find_participation(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<Participation>, StoreError> {
        let request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(task_pk(task_id)))
            .key("SK", s(player_sk(user_id)))
            .consistent_read(true)
            .send();
        let output = self.call("GetItem(participation)", request).await?;
        output.item().map(participation_from_item).transpose()
    }

    async fn upsert_application(&self, participation: &Participation) -> Result<bool, StoreError> {
        let request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(participation_to_item(participation)))
            .condition_expression("attribute_not_exists(PK) OR #status = :give_up")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":give_up", s(ParticipationStatus::GiveUp.as_str()))
            .send();
        Ok(self
            .call_conditional("PutItem(participation)", request)
            .await?
            .is_some())
    }

    async fn transition_participation(
        &self,
        task_id: &str,
        user_id: &str,
        from: ParticipationStatus,
        to: ParticipationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(task_pk(task_id)))
            .key("SK", s(player_sk(user_id)))
            .update_expression("SET #status = :to, updated_at = :at")
            .condition_expression("#status = :from")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":from", s(from.as_str()))
            .expression_attribute_values(":to", s(to.as_str()))
            .expression_attribute_values(":at", time(&at))
            .send();
        Ok(self
            .call_conditional("UpdateItem(participation status)", request)
            .await?
            .is_some())
    }

    async fn write_review(
        &self,
        task_id: &str,
        user_id: &str,
        patch: &ReviewPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut update = UpdateBuilder::default();
        if let Some(degree) = patch.degree {
            update.set("degree", n(degree));
        }
        if let Some(remark) = &patch.remark {
            update.set("remark", s(remark.clone()));
        }
        if let Some(score) = patch.score {
            update.set("score", n(score));
        }
        if let Some(feedback) = &patch.feedback {
            update.set("feedback", s(feedback.clone()));
        }
        update.set("updated_at", time(&at));
        update.name("#status", "status");
        update.value(":finish", s(ParticipationStatus::Finish.as_str()));
        update.value(":failure", s(ParticipationStatus::Failure.as_str()));

        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(task_pk(task_id)))
            .key("SK", s(player_sk(user_id)))
            .update_expression(update.expression())
            .condition_expression("#status IN (:finish, :failure)");
        for (k, v) in update.names {
            builder = builder.expression_attribute_names(k, v);
        }
        for (k, v) in update.values {
            builder = builder.expression_attribute_values(k, v);
        }

        Ok(self
            .call_conditional("UpdateItem(participation review)", builder.send())
            .await?
            .is_some())
    }

    async fn find_task_participations(
        &self,
        task_id: &str,
        status: Option<ParticipationStatus>,
    ) -> Result<Vec<Participation>, StoreError> {
        let items = self
            .query_all(
                "Query(task participations)",
                None,
                "PK = :pk AND begins_with(SK, :sk_prefix)",
                vec![(":pk", s(task_pk(task_id))), (":sk_prefix", s("PLAYER#"))],
            )
            .await?;
        let mut participations = decode_all(&items)?;
        if let Some(status) = status {
            participations.retain(|p| p.status == status);
        }
        participations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(participations)
    }

    async fn find_user_participations(&self, user_id: &str) -> Result<Vec<Participation>, StoreError> {
        let index = self.index_name.clone();
        let items = self
            .query_all(
                "Query(user participations)",
                Some(&index),
                "GSI1PK = :pk AND begins_with(GSI1SK, :sk_prefix)",
                vec![(":pk", s(user_gsi_pk(user_id))), (":sk_prefix", s("PLAYER#"))],
            )
            .await?;
        let mut participations = decode_all(&items)?;
        participations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(participations)
    }
}
