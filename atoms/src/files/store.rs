use async_trait::async_trait;

use super::model::{Binding, FileKind, FileRef};
use crate::error::StoreError;

/// File collaborator. Uploads happen elsewhere; the engine only binds files
/// to owners and releases them.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Attaches an unowned file, or confirms one already attached to
    /// `owner_id`. A file owned by anything else is never moved.
    async fn bind_to_owner(&self, file_id: &str, owner_id: &str) -> Result<Binding, StoreError>;

    /// Deletes the file and its blob while it is still attached to
    /// `owner_id`. Returns `false` for unknown files and files owned elsewhere.
    async fn release(&self, file_id: &str, owner_id: &str) -> Result<bool, StoreError>;

    async fn list_by_owner(
        &self,
        owner_id: &str,
        kind: Option<FileKind>,
    ) -> Result<Vec<FileRef>, StoreError>;
}
