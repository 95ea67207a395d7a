use std::fmt::Debug;

use async_trait::async_trait;

use tracing::warn;

use crate::data_types::UploadRecord;
use crate::repository::interface::Repository;

/// Reactions to an upload record being created or deleted. Implementors
/// deal with their own failures: nothing they do can undo the record change
/// that triggered them, so they log and carry on.
#[async_trait]
pub trait RecordLifecycle: Send + Sync + Debug {
    async fn on_record_created(&self, _record: &UploadRecord) {}

    async fn on_record_deleted(&self, _record: &UploadRecord) {}
}

/// Whether another record still owns the table and layer of a deleted record.
/// Records of the same kind and name share both. If the records can't be
/// listed, the deleted one is assumed to have been the last.
pub async fn superseded(repository: &dyn Repository, deleted: &UploadRecord) -> bool {
    match repository.list_uploads().await {
        Ok(records) => records
            .iter()
            .any(|r| r.id != deleted.id && r.kind == deleted.kind && r.name == deleted.name),
        Err(e) => {
            warn!("Error listing uploads while deleting {:?}: {e}", deleted.name);
            false
        }
    }
}
