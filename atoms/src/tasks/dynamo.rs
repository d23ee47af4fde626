use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};

use super::model::{Reward, Task, TaskCounter, TaskFilter, TaskPatch, TaskSort, TaskStatus, TaskType};
use super::store::TaskStore;
use crate::dynamo::{
    describe, get_bool, get_list_s, get_n, get_s, n, require_s, require_time, s, time, DynamoStore,
    Item, UpdateBuilder,
};
use crate::error::StoreError;
use crate::page::Page;

const TASK_PK: &str = "TASK";

fn task_sk(task_id: &str) -> String {
    format!("TASK#{}", task_id)
}

fn reward_attributes(reward: &Reward) -> Vec<(&'static str, AttributeValue)> {
    let mut attributes = vec![("reward_kind", s(reward.kind()))];
    if let Some(amount) = reward.amount() {
        attributes.push(("reward_amount", n(amount)));
    }
    if let Reward::Object { description } = reward {
        attributes.push(("reward_object", s(description.clone())));
    }
    attributes
}

fn attachments_value(attachments: &[String]) -> AttributeValue {
    AttributeValue::L(attachments.iter().map(|id| s(id.clone())).collect())
}

pub(crate) fn task_to_item(task: &Task) -> Item {
    let mut item = Item::new();
    item.insert("PK".to_string(), s(TASK_PK));
    item.insert("SK".to_string(), s(task_sk(&task.task_id)));
    item.insert("publisher_id".to_string(), s(task.publisher_id.clone()));
    item.insert("title".to_string(), s(task.title.clone()));
    item.insert("content".to_string(), s(task.content.clone()));
    item.insert("task_type".to_string(), s(task.task_type.as_str()));
    item.insert("status".to_string(), s(task.status.as_str()));
    for (name, value) in reward_attributes(&task.reward) {
        item.insert(name.to_string(), value);
    }
    item.insert("start_time".to_string(), time(&task.start_time));
    item.insert("end_time".to_string(), time(&task.end_time));
    item.insert("max_player".to_string(), n(task.max_player));
    item.insert("auto_accept".to_string(), AttributeValue::Bool(task.auto_accept));
    item.insert("attachments".to_string(), attachments_value(&task.attachments));
    for counter in [
        TaskCounter::Views,
        TaskCounter::Likes,
        TaskCounter::Collects,
        TaskCounter::Comments,
        TaskCounter::Players,
    ] {
        item.insert(counter.attribute().to_string(), n(task.counter(counter)));
    }
    item.insert("created_at".to_string(), time(&task.created_at));
    item.insert("updated_at".to_string(), time(&task.updated_at));
    item
}

pub(crate) fn task_from_item(item: &Item) -> Result<Task, StoreError> {
    let sk = require_s(item, "SK")?;
    let task_id = sk
        .strip_prefix("TASK#")
        .ok_or_else(|| StoreError::malformed(describe(item), "not a task key"))?
        .to_string();

    let status = require_s(item, "status")?;
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| StoreError::malformed(describe(item), format!("unknown status {status}")))?;
    let task_type = require_s(item, "task_type")?;
    let task_type = TaskType::parse(&task_type)
        .ok_or_else(|| StoreError::malformed(describe(item), format!("unknown type {task_type}")))?;
    let reward_kind = get_s(item, "reward_kind").unwrap_or_else(|| "none".to_string());
    let reward = Reward::from_parts(
        &reward_kind,
        get_n(item, "reward_amount"),
        get_s(item, "reward_object"),
    )
    .ok_or_else(|| StoreError::malformed(describe(item), format!("bad {reward_kind} reward")))?;

    Ok(Task {
        task_id,
        publisher_id: require_s(item, "publisher_id")?,
        title: get_s(item, "title").unwrap_or_default(),
        content: get_s(item, "content").unwrap_or_default(),
        task_type,
        status,
        reward,
        start_time: require_time(item, "start_time")?,
        end_time: require_time(item, "end_time")?,
        max_player: get_n(item, "max_player").unwrap_or(0),
        auto_accept: get_bool(item, "auto_accept").unwrap_or(false),
        attachments: get_list_s(item, "attachments"),
        views: get_n(item, "views").unwrap_or(0),
        likes: get_n(item, "likes").unwrap_or(0),
        collects: get_n(item, "collects").unwrap_or(0),
        comments: get_n(item, "comments").unwrap_or(0),
        player_count: get_n(item, "player_count").unwrap_or(0),
        created_at: require_time(item, "created_at")?,
        updated_at: require_time(item, "updated_at")?,
    })
}

impl DynamoStore {
    async fn load_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let items = self
            .query_all(
                "Query(tasks)",
                None,
                "PK = :pk AND begins_with(SK, :sk_prefix)",
                vec![(":pk", s(TASK_PK)), (":sk_prefix", s("TASK#"))],
            )
            .await?;

        let mut tasks = Vec::with_capacity(items.len());
        for item in &items {
            let task = task_from_item(item)?;
            if filter.matches(&task) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskStore for DynamoStore {
    async fn find_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(TASK_PK))
            .key("SK", s(task_sk(task_id)))
            .consistent_read(true)
            .send();
        let output = self.call("GetItem(task)", request).await?;
        output.item().map(task_from_item).transpose()
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(task_to_item(task)))
            .condition_expression("attribute_not_exists(PK)")
            .send();
        match self.call_conditional("PutItem(task)", request).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::malformed(task_sk(&task.task_id), "task id already taken")),
        }
    }

    async fn transition_task(
        &self,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(TASK_PK))
            .key("SK", s(task_sk(task_id)))
            .update_expression("SET #status = :to, updated_at = :at")
            .condition_expression("#status = :from")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":from", s(from.as_str()))
            .expression_attribute_values(":to", s(to.as_str()))
            .expression_attribute_values(":at", time(&at))
            .send();
        Ok(self
            .call_conditional("UpdateItem(task status)", request)
            .await?
            .is_some())
    }

    async fn update_task_info(
        &self,
        task_id: &str,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut update = UpdateBuilder::default();

        if let Some(title) = &patch.title {
            update.set("title", s(title.clone()));
        }
        if let Some(content) = &patch.content {
            update.set("content", s(content.clone()));
        }
        if let Some(reward) = &patch.reward {
            for (name, value) in reward_attributes(reward) {
                update.set(name, value);
            }
            if reward.amount().is_none() {
                update.remove("reward_amount");
            }
            if !matches!(reward, Reward::Object { .. }) {
                update.remove("reward_object");
            }
        }
        if let Some(start_time) = &patch.start_time {
            update.set("start_time", time(start_time));
        }
        if let Some(end_time) = &patch.end_time {
            update.set("end_time", time(end_time));
        }
        if let Some(max_player) = patch.max_player {
            update.set("max_player", n(max_player));
        }
        if let Some(auto_accept) = patch.auto_accept {
            update.set("auto_accept", AttributeValue::Bool(auto_accept));
        }
        if let Some(attachments) = &patch.attachments {
            update.set("attachments", attachments_value(attachments));
        }
        update.set("updated_at", time(&at));

        let mut condition = "#status IN (:draft, :wait)".to_string();
        update.name("#status", "status");
        update.value(":draft", s(TaskStatus::Draft.as_str()));
        update.value(":wait", s(TaskStatus::Wait.as_str()));
        if let Some(max_player) = patch.max_player.filter(|m| *m > 0) {
            condition.push_str(" AND player_count <= :cap");
            update.value(":cap", n(max_player));
        }

        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(TASK_PK))
            .key("SK", s(task_sk(task_id)))
            .update_expression(update.expression())
            .condition_expression(condition);

        for (k, v) in update.names {
            builder = builder.expression_attribute_names(k, v);
        }
        for (k, v) in update.values {
            builder = builder.expression_attribute_values(k, v);
        }

        Ok(self
            .call_conditional("UpdateItem(task info)", builder.send())
            .await?
            .is_some())
    }

    async fn increment_counter(
        &self,
        task_id: &str,
        counter: TaskCounter,
        delta: i64,
    ) -> Result<bool, StoreError> {
        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(TASK_PK))
            .key("SK", s(task_sk(task_id)))
            .update_expression("SET #counter = if_not_exists(#counter, :zero) + :delta")
            .expression_attribute_names("#counter", counter.attribute())
            .expression_attribute_values(":zero", n(0))
            .expression_attribute_values(":delta", n(delta));

        builder = if delta < 0 {
            builder
                .condition_expression("attribute_exists(PK) AND #counter >= :floor")
                .expression_attribute_values(":floor", n(-delta))
        } else {
            builder.condition_expression("attribute_exists(PK)")
        };

        Ok(self
            .call_conditional("UpdateItem(task counter)", builder.send())
            .await?
            .is_some())
    }

    async fn try_add_player(&self, task_id: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(TASK_PK))
            .key("SK", s(task_sk(task_id)))
            .update_expression("SET player_count = player_count + :one")
            .condition_expression(
                "#status = :wait AND (max_player = :zero OR player_count < max_player)",
            )
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":wait", s(TaskStatus::Wait.as_str()))
            .expression_attribute_values(":zero", n(0))
            .expression_attribute_values(":one", n(1))
            .send();
        Ok(self
            .call_conditional("UpdateItem(task players)", request)
            .await?
            .is_some())
    }

    async fn delete_draft_task(&self, task_id: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", s(TASK_PK))
            .key("SK", s(task_sk(task_id)))
            .condition_expression("#status = :draft")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":draft", s(TaskStatus::Draft.as_str()))
            .send();
        Ok(self
            .call_conditional("DeleteItem(task)", request)
            .await?
            .is_some())
    }

    async fn find_tasks(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.load_tasks(filter).await?;
        sort.sort(&mut tasks);
        Ok(page.slice(tasks))
    }

    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        Ok(self.load_tasks(filter).await?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::NewTask;
    use chrono::Duration;

    #[test]
    fn task_item_round_trip_keeps_reward_and_counters() {
        let now = Utc::now();
        let mut task = Task::draft(
            "0190f1c2".to_string(),
            "u-1".to_string(),
            NewTask {
                title: "Survey on campus food".to_string(),
                content: "ten questions".to_string(),
                task_type: TaskType::Questionnaire,
                reward: Reward::Object {
                    description: "canteen voucher".to_string(),
                },
                start_time: now,
                end_time: now + Duration::days(3),
                max_player: 50,
                auto_accept: true,
                attachments: vec!["f-1".to_string()],
            },
            now,
        );
        task.likes = 4;
        task.player_count = 2;

        let item = task_to_item(&task);
        assert_eq!(get_s(&item, "SK").as_deref(), Some("TASK#0190f1c2"));
        assert!(!item.contains_key("reward_amount"));

        let back = task_from_item(&item).expect("decodes");
        assert_eq!(back.reward, task.reward);
        assert_eq!(back.likes, 4);
        assert_eq!(back.player_count, 2);
        assert_eq!(back.attachments, vec!["f-1".to_string()]);
        assert_eq!(back.start_time.timestamp(), task.start_time.timestamp());
    }
}
