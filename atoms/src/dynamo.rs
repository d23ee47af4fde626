//! Single-table DynamoDB plumbing shared by every atom's store implementation.
//!
//! Key layout:
//! - Task:          PK=TASK              SK=TASK#{task_id}
//! - Participation: PK=TASK#{task_id}    SK=PLAYER#{user_id}   (GSI: USER#{user_id} / PLAYER#{task_id})
//! - Membership:    PK=USER#{user_id}    SK=MEMBERSHIP
//! - User:          PK=USER#{user_id}    SK=USER#{user_id}
//! - File:          PK=FILE#{file_id}    SK=FILE#{file_id}     (GSI: OWNER#{owner} / FILE#{file_id})
//! - Message:       PK=USER#{to}         SK=MESSAGE#{message_id}

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;

pub(crate) type Item = HashMap<String, AttributeValue>;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

/// Durable Store backed by one DynamoDB table. Every call is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    pub(crate) client: DynamoClient,
    pub(crate) table_name: String,
    pub(crate) index_name: String,
    pub(crate) timeout: Duration,
}

impl DynamoStore {
    pub fn new(
        client: DynamoClient,
        table_name: impl Into<String>,
        index_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            index_name: index_name.into(),
            timeout,
        }
    }

    /// Runs one SDK call under the store deadline.
    pub(crate) async fn call<T, E, R, F>(&self, op: &'static str, request: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, SdkError<E, R>>>,
        E: std::error::Error + 'static,
        R: std::fmt::Debug + 'static,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(StoreError::backend(op, DisplayErrorContext(&e))),
            Err(_) => Err(StoreError::Timeout(op)),
        }
    }

    /// Like `call`, but a failed condition expression is reported as `Ok(None)`
    /// (matched nothing, modified nothing) instead of an error.
    pub(crate) async fn call_conditional<T, E, R, F>(
        &self,
        op: &'static str,
        request: F,
    ) -> Result<Option<T>, StoreError>
    where
        F: Future<Output = Result<T, SdkError<E, R>>>,
        E: std::error::Error + ProvideErrorMetadata + 'static,
        R: std::fmt::Debug + 'static,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(output)) => Ok(Some(output)),
            Ok(Err(e)) if is_condition_failure(&e) => Ok(None),
            Ok(Err(e)) => Err(StoreError::backend(op, DisplayErrorContext(&e))),
            Err(_) => Err(StoreError::Timeout(op)),
        }
    }

    /// Reads every page of a key-condition query.
    pub(crate) async fn query_all(
        &self,
        op: &'static str,
        index: Option<&str>,
        key_condition: &str,
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut builder = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression(key_condition)
                .set_exclusive_start_key(start_key.take());
            if let Some(index) = index {
                builder = builder.index_name(index);
            }
            for (name, value) in &values {
                builder = builder.expression_attribute_values(*name, value.clone());
            }

            let output = self.call(op, builder.send()).await?;
            items.extend(output.items().iter().cloned());

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }
}

fn is_condition_failure<E, R>(error: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    error
        .as_service_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == CONDITIONAL_CHECK_FAILED)
}

pub(crate) fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub(crate) fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub(crate) fn time(value: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(value.to_rfc3339())
}

pub(crate) fn get_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

pub(crate) fn get_n<T: FromStr>(item: &Item, key: &str) -> Option<T> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

pub(crate) fn get_bool(item: &Item, key: &str) -> Option<bool> {
    item.get(key).and_then(|v| v.as_bool().ok()).copied()
}

pub(crate) fn get_ss(item: &Item, key: &str) -> BTreeSet<String> {
    item.get(key)
        .and_then(|v| v.as_ss().ok())
        .map(|values| values.iter().cloned().collect())
        .unwrap_or_default()
}

pub(crate) fn get_list_s(item: &Item, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(|v| v.as_l().ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_s().ok().cloned())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn get_time(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Required string attribute; a missing one means the document is corrupt.
pub(crate) fn require_s(item: &Item, key: &str) -> Result<String, StoreError> {
    get_s(item, key).ok_or_else(|| StoreError::malformed(describe(item), format!("missing {key}")))
}

pub(crate) fn require_time(item: &Item, key: &str) -> Result<DateTime<Utc>, StoreError> {
    get_time(item, key)
        .ok_or_else(|| StoreError::malformed(describe(item), format!("missing or invalid {key}")))
}

pub(crate) fn describe(item: &Item) -> String {
    format!(
        "{}/{}",
        get_s(item, "PK").unwrap_or_default(),
        get_s(item, "SK").unwrap_or_default()
    )
}

/// `SET` expression accumulator, the same shape for every partial update.
#[derive(Debug, Default)]
pub(crate) struct UpdateBuilder {
    sets: Vec<String>,
    removes: Vec<String>,
    pub(crate) names: HashMap<String, String>,
    pub(crate) values: HashMap<String, AttributeValue>,
}

impl UpdateBuilder {
    pub(crate) fn set(&mut self, attribute: &str, value: AttributeValue) {
        self.sets.push(format!("#{attribute} = :{attribute}"));
        self.names.insert(format!("#{attribute}"), attribute.to_string());
        self.values.insert(format!(":{attribute}"), value);
    }

    pub(crate) fn remove(&mut self, attribute: &str) {
        self.removes.push(format!("#{attribute}"));
        self.names.insert(format!("#{attribute}"), attribute.to_string());
    }

    pub(crate) fn value(&mut self, placeholder: &str, value: AttributeValue) {
        self.values.insert(placeholder.to_string(), value);
    }

    pub(crate) fn name(&mut self, placeholder: &str, attribute: &str) {
        self.names.insert(placeholder.to_string(), attribute.to_string());
    }

    pub(crate) fn expression(&self) -> String {
        let mut parts = Vec::new();
        if !self.sets.is_empty() {
            parts.push(format!("SET {}", self.sets.join(", ")));
        }
        if !self.removes.is_empty() {
            parts.push(format!("REMOVE {}", self.removes.join(", ")));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_builder_joins_set_and_remove_clauses() {
        let mut update = UpdateBuilder::default();
        update.set("title", s("Walk the dog"));
        update.set("max_player", n(3));
        update.remove("remark");

        assert_eq!(
            update.expression(),
            "SET #title = :title, #max_player = :max_player REMOVE #remark"
        );
        assert_eq!(update.names.get("#remark").map(String::as_str), Some("remark"));
        assert_eq!(update.values.len(), 2);
    }

    #[test]
    fn attribute_readers_tolerate_missing_and_mistyped_values() {
        let mut item = Item::new();
        item.insert("PK".to_string(), s("TASK"));
        item.insert("views".to_string(), n(12));
        item.insert("title".to_string(), AttributeValue::Bool(true));

        assert_eq!(get_n::<i64>(&item, "views"), Some(12));
        assert_eq!(get_s(&item, "title"), None);
        assert!(get_ss(&item, "liked_tasks").is_empty());
        assert!(matches!(
            require_s(&item, "title"),
            Err(StoreError::Malformed { key, .. }) if key == "TASK/"
        ));
    }
}
