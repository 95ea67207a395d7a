use std::fmt::Debug;

use async_trait::async_trait;

use crate::data_types::{JsonObject, NewUploadRecord, TableData, UploadId, UploadRecord};

/// Wrapper for conversion of database-specific error codes into actual errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Relation {name:?} does not exist")]
    RelationDoesNotExist { name: String },

    #[error("Unknown upload kind {0:?}")]
    UnknownUploadKind(String),

    #[error("Table {name:?} has no columns")]
    NoColumns { name: String },

    #[error("Error running migrations: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    // All other errors
    #[error("Internal SQL error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything this service reads from or writes to the spatial database:
/// the upload record store, the derived tables and the pre-provisioned views.
#[async_trait]
pub trait Repository: Send + Sync + Debug {
    async fn setup(&self) -> Result<()>;

    async fn create_upload(&self, record: &NewUploadRecord) -> Result<UploadRecord>;

    async fn get_upload(&self, id: UploadId) -> Result<Option<UploadRecord>>;

    async fn list_uploads(&self) -> Result<Vec<UploadRecord>>;

    /// Returns the deleted record, or `None` if it didn't exist
    async fn delete_upload(&self, id: UploadId) -> Result<Option<UploadRecord>>;

    /// Drop and recreate `table_name` with the given contents in one transaction.
    /// Returns the number of rows written.
    async fn replace_table(&self, table_name: &str, data: &TableData) -> Result<u64>;

    /// Drop `table_name` if it exists
    async fn drop_table(&self, table_name: &str) -> Result<()>;

    async fn table_exists(&self, table_name: &str) -> Result<bool>;

    /// Read every row of a table or view as a JSON object. If `geometry_column`
    /// is passed, that column is returned as a GeoJSON geometry object.
    async fn select_rows(
        &self,
        relation: &str,
        geometry_column: Option<&str>,
    ) -> Result<Vec<JsonObject>>;
}
