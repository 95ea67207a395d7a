use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::data_types::UploadRecord;
use crate::lifecycle::{superseded, RecordLifecycle};
use crate::repository::interface::Repository;

/// Drops the derived table of a deleted upload record
#[derive(Debug)]
pub struct TeardownHandler {
    repository: Arc<dyn Repository>,
}

impl TeardownHandler {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl RecordLifecycle for TeardownHandler {
    async fn on_record_deleted(&self, record: &UploadRecord) {
        let table = record.table_name();
        if superseded(self.repository.as_ref(), record).await {
            info!("Keeping table {table:?}, another {} upload named {:?} uses it", record.kind, record.name);
            return;
        }

        match self.repository.drop_table(&table).await {
            Ok(()) => info!("Dropped table {table:?}"),
            Err(e) => error!("Error dropping table {table:?}: {e}"),
        }
    }
}
