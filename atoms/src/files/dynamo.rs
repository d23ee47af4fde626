use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

use super::model::{Binding, FileKind, FileRef};
use super::store::FileStore;
use crate::dynamo::{get_s, get_time, require_s, s, DynamoStore, Item};
use crate::error::StoreError;

fn file_key(file_id: &str) -> String {
    format!("FILE#{}", file_id)
}

fn owner_pk(owner_id: &str) -> String {
    format!("OWNER#{}", owner_id)
}

fn file_from_item(item: &Item) -> Result<FileRef, StoreError> {
    Ok(FileRef {
        file_id: require_s(item, "file_id")?,
        owner_id: get_s(item, "owner_id"),
        kind: FileKind::parse(&get_s(item, "kind").unwrap_or_default()),
        object_key: require_s(item, "object_key")?,
        uploaded_at: get_time(item, "uploaded_at").unwrap_or_default(),
    })
}

/// File registry rows in the shared table, blobs in S3.
#[derive(Debug, Clone)]
pub struct DynamoFileStore {
    store: DynamoStore,
    s3: S3Client,
    bucket: String,
}

impl DynamoFileStore {
    pub fn new(store: DynamoStore, s3: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            store,
            s3,
            bucket: bucket.into(),
        }
    }

    async fn find_file(&self, file_id: &str) -> Result<Option<FileRef>, StoreError> {
        let key = file_key(file_id);
        let request = self
            .store
            .client
            .get_item()
            .table_name(&self.store.table_name)
            .key("PK", s(key.clone()))
            .key("SK", s(key))
            .send();
        let output = self.store.call("GetItem(file)", request).await?;
        output.item().map(file_from_item).transpose()
    }
}

#[async_trait]
impl FileStore for DynamoFileStore {
    async fn bind_to_owner(&self, file_id: &str, owner_id: &str) -> Result<Binding, StoreError> {
        let key = file_key(file_id);
        let request = self
            .store
            .client
            .update_item()
            .table_name(&self.store.table_name)
            .key("PK", s(key.clone()))
            .key("SK", s(key))
            .update_expression("SET owner_id = :owner, GSI1PK = :gsi_pk, GSI1SK = :gsi_sk")
            .condition_expression(
                "attribute_exists(PK) AND (attribute_not_exists(owner_id) OR owner_id = :owner)",
            )
            .expression_attribute_values(":owner", s(owner_id))
            .expression_attribute_values(":gsi_pk", s(owner_pk(owner_id)))
            .expression_attribute_values(":gsi_sk", s(file_key(file_id)))
            .send();
        if self
            .store
            .call_conditional("UpdateItem(file owner)", request)
            .await?
            .is_some()
        {
            return Ok(Binding::Bound);
        }

        match self.find_file(file_id).await? {
            None => Ok(Binding::Missing),
            Some(file) => {
                tracing::warn!(file_id, owner_id, current = ?file.owner_id, "file bound to another owner");
                Ok(Binding::Taken)
            }
        }
    }

    async fn release(&self, file_id: &str, owner_id: &str) -> Result<bool, StoreError> {
        let Some(file) = self.find_file(file_id).await? else {
            return Ok(false);
        };
        if file.owner_id.as_deref() != Some(owner_id) {
            return Ok(false);
        }

        // Row first, under the owner condition, so a concurrent re-bind keeps its blob.
        let key = file_key(file_id);
        let delete_row = self
            .store
            .client
            .delete_item()
            .table_name(&self.store.table_name)
            .key("PK", s(key.clone()))
            .key("SK", s(key))
            .condition_expression("owner_id = :owner")
            .expression_attribute_values(":owner", s(owner_id))
            .send();
        if self
            .store
            .call_conditional("DeleteItem(file)", delete_row)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        let delete_blob = self
            .s3
            .delete_object()
            .bucket(&self.bucket)
            .key(&file.object_key)
            .send();
        self.store.call("DeleteObject(file)", delete_blob).await?;

        tracing::info!(file_id, owner_id, object_key = %file.object_key, "file released");
        Ok(true)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        kind: Option<FileKind>,
    ) -> Result<Vec<FileRef>, StoreError> {
        let index = self.store.index_name.clone();
        let items = self
            .store
            .query_all(
                "Query(files by owner)",
                Some(&index),
                "GSI1PK = :pk AND begins_with(GSI1SK, :sk_prefix)",
                vec![(":pk", s(owner_pk(owner_id))), (":sk_prefix", s("FILE#"))],
            )
            .await?;

        let mut files = Vec::with_capacity(items.len());
        for item in &items {
            let file = file_from_item(item)?;
            if kind.map_or(true, |k| k == file.kind) {
                files.push(file);
            }
        }
        Ok(files)
    }
}
