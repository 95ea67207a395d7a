use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::data_types::{
    JsonObject, NewUploadRecord, TableData, UploadId, UploadRecord,
};

use super::interface::{Error, Repository, Result};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: UploadId,
    uploads: Vec<UploadRecord>,
    tables: HashMap<String, TableData>,
    views: HashMap<String, Vec<JsonObject>>,
}

/// Process-local repository, used when no database is around (tests, demos).
/// Views are seeded up front and returned exactly as seeded; geometry cells of
/// derived tables come back as the WKT text they were stored with.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(self, name: &str, rows: Vec<JsonObject>) -> Self {
        self.state.lock().views.insert(name.to_string(), rows);
        self
    }

    pub fn table(&self, table_name: &str) -> Option<TableData> {
        self.state.lock().tables.get(table_name).cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn create_upload(&self, record: &NewUploadRecord) -> Result<UploadRecord> {
        let mut state = self.state.lock();
        state.next_id += 1;

        let record = UploadRecord {
            id: state.next_id,
            kind: record.kind,
            name: record.name.clone(),
            file: record.file.clone(),
            uploaded_time: Utc::now(),
            geometry: record.geometry.clone(),
        };
        state.uploads.push(record.clone());
        Ok(record)
    }

    async fn get_upload(&self, id: UploadId) -> Result<Option<UploadRecord>> {
        Ok(self
            .state
            .lock()
            .uploads
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list_uploads(&self) -> Result<Vec<UploadRecord>> {
        let mut uploads = self.state.lock().uploads.clone();
        uploads.sort_by(|a, b| {
            b.uploaded_time
                .cmp(&a.uploaded_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(uploads)
    }

    async fn delete_upload(&self, id: UploadId) -> Result<Option<UploadRecord>> {
        let mut state = self.state.lock();
        Ok(state
            .uploads
            .iter()
            .position(|r| r.id == id)
            .map(|index| state.uploads.remove(index)))
    }

    async fn replace_table(&self, table_name: &str, data: &TableData) -> Result<u64> {
        if data.columns.is_empty() {
            return Err(Error::NoColumns {
                name: table_name.to_string(),
            });
        }

        let rows = data
            .rows
            .iter()
            .map(|row| {
                data.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| column.column_type.coerce(value))
                    .collect()
            })
            .collect();

        let stored = TableData {
            columns: data.columns.clone(),
            rows,
        };
        let written = stored.row_count() as u64;
        self.state
            .lock()
            .tables
            .insert(table_name.to_string(), stored);
        Ok(written)
    }

    async fn drop_table(&self, table_name: &str) -> Result<()> {
        self.state.lock().tables.remove(table_name);
        Ok(())
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool> {
        Ok(self.state.lock().tables.contains_key(table_name))
    }

    async fn select_rows(
        &self,
        relation: &str,
        _geometry_column: Option<&str>,
    ) -> Result<Vec<JsonObject>> {
        let state = self.state.lock();

        if let Some(rows) = state.views.get(relation) {
            return Ok(rows.clone());
        }

        match state.tables.get(relation) {
            Some(table) => Ok(table
                .rows
                .iter()
                .map(|row| {
                    table
                        .columns
                        .iter()
                        .map(|c| c.name.clone())
                        .zip(row.iter().cloned())
                        .collect()
                })
                .collect()),
            None => Err(Error::RelationDoesNotExist {
                name: relation.to_string(),
            }),
        }
    }
}
