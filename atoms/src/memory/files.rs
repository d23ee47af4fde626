use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::files::{Binding, FileKind, FileRef, FileStore};

/// File registry held in memory. Released ids are kept for assertions.
#[derive(Debug, Default)]
pub struct InMemoryFiles {
    files: RwLock<HashMap<String, FileRef>>,
    released: RwLock<Vec<String>>,
}

impl InMemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, file: FileRef) {
        self.files.write().await.insert(file.file_id.clone(), file);
    }

    pub async fn get(&self, file_id: &str) -> Option<FileRef> {
        self.files.read().await.get(file_id).cloned()
    }

    pub async fn released(&self) -> Vec<String> {
        self.released.read().await.clone()
    }
}

#[async_trait]
impl FileStore for InMemoryFiles {
    async fn bind_to_owner(&self, file_id: &str, owner_id: &str) -> Result<Binding, StoreError> {
        let mut files = self.files.write().await;
        let Some(file) = files.get_mut(file_id) else {
            return Ok(Binding::Missing);
        };
        match file.owner_id.as_deref() {
            Some(current) if current != owner_id => Ok(Binding::Taken),
            _ => {
                file.owner_id = Some(owner_id.to_string());
                Ok(Binding::Bound)
            }
        }
    }

    async fn release(&self, file_id: &str, owner_id: &str) -> Result<bool, StoreError> {
        let mut files = self.files.write().await;
        if !files
            .get(file_id)
            .is_some_and(|f| f.owner_id.as_deref() == Some(owner_id))
        {
            return Ok(false);
        }
        files.remove(file_id);
        self.released.write().await.push(file_id.to_string());
        Ok(true)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        kind: Option<FileKind>,
    ) -> Result<Vec<FileRef>, StoreError> {
        let mut found: Vec<FileRef> = self
            .files
            .read()
            .await
            .values()
            .filter(|f| f.owner_id.as_deref() == Some(owner_id))
            .filter(|f| kind.map_or(true, |k| f.kind == k))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(found)
    }
}
