//! Turning uploaded files into database tables.
//!
//! Each upload record owns one derived table, named after the record's kind
//! and name. Every time a record is created the table is rebuilt from the
//! record's file; GeoJSON tables are then published as map layers.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use geo::Rect;
use strum_macros::Display;
use tracing::{error, info, warn};

use crate::data_types::{TableData, UploadKind, UploadRecord};
use crate::lifecycle::RecordLifecycle;
use crate::media::MediaStore;
use crate::publish::CatalogPublisher;
use crate::repository::interface::Repository;

pub mod geojson;
pub mod json;
pub mod table;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Upload file {path:?} not found")]
    FileNotFound { path: PathBuf },

    #[error("Error reading upload file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing JSON: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Invalid GeoJSON: {0}")]
    GeoJsonError(#[from] ::geojson::Error),

    #[error("Expected a JSON object with a \"data\" array")]
    NotAnObject,

    #[error("\"data\" must be an array of rows")]
    DataNotAnArray,

    #[error("\"columns\" must be an array of column names")]
    ColumnsNotAnArray,

    #[error("Row {row} has {got} values, but {expected} columns were given")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("Error writing table: {0}")]
    RepositoryError(#[from] crate::repository::interface::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[strum(serialize = "the record has no file")]
    NoFile,
    #[strum(serialize = "the file has no features")]
    NoFeatures,
    #[strum(serialize = "every geometry in the file is empty")]
    EmptyGeometries,
    #[strum(serialize = "the file has no data rows")]
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Loaded {
        table: String,
        rows: u64,
        bounds: Option<Rect<f64>>,
    },
    Skipped {
        reason: SkipReason,
    },
}

#[derive(Debug)]
pub struct IngestionPipeline {
    repository: Arc<dyn Repository>,
    media: Arc<MediaStore>,
    publisher: Option<Arc<CatalogPublisher>>,
    srid: i32,
}

impl IngestionPipeline {
    pub fn new(repository: Arc<dyn Repository>, media: Arc<MediaStore>, srid: i32) -> Self {
        Self {
            repository,
            media,
            publisher: None,
            srid,
        }
    }

    /// Publish every GeoJSON table that gets loaded
    pub fn with_publisher(mut self, publisher: Arc<CatalogPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    async fn read_file(&self, relative: &str) -> Result<Vec<u8>, IngestError> {
        self.media.read(relative).await.map_err(|source| {
            let path = self.media.path(relative);
            if source.kind() == ErrorKind::NotFound {
                IngestError::FileNotFound { path }
            } else {
                IngestError::Io { path, source }
            }
        })
    }

    /// Rebuild the record's table from its file. Nothing is written when the
    /// file holds nothing worth loading.
    pub async fn ingest(&self, record: &UploadRecord) -> Result<IngestOutcome, IngestError> {
        let file = match record.file.as_deref() {
            Some(file) if !file.is_empty() => file,
            _ => {
                return Ok(IngestOutcome::Skipped {
                    reason: SkipReason::NoFile,
                })
            }
        };
        let bytes = self.read_file(file).await?;

        let (data, bounds): (TableData, _) = match record.kind {
            UploadKind::GeoJson => {
                let parsed = geojson::parse_geojson(&bytes, self.srid)?;
                if parsed.table.row_count() == 0 {
                    return Ok(IngestOutcome::Skipped {
                        reason: SkipReason::NoFeatures,
                    });
                }
                if parsed.geometries == 0 {
                    return Ok(IngestOutcome::Skipped {
                        reason: SkipReason::EmptyGeometries,
                    });
                }
                (parsed.table, parsed.bounds)
            }
            UploadKind::Json => match json::parse_json(&bytes)? {
                Some(data) => (data, None),
                None => {
                    return Ok(IngestOutcome::Skipped {
                        reason: SkipReason::NoData,
                    })
                }
            },
        };

        let table = record.table_name();
        let rows = self.repository.replace_table(&table, &data).await?;
        info!(
            "Loaded {rows} row(s) from {file:?} into table {table:?} ({} column(s))",
            data.columns.len()
        );

        Ok(IngestOutcome::Loaded {
            table,
            rows,
            bounds,
        })
    }
}

#[async_trait]
impl RecordLifecycle for IngestionPipeline {
    async fn on_record_created(&self, record: &UploadRecord) {
        match self.ingest(record).await {
            Ok(IngestOutcome::Loaded { table, .. }) => {
                if record.kind == UploadKind::GeoJson {
                    if let Some(publisher) = &self.publisher {
                        publisher.publish_logged(&record.name, &table).await;
                    }
                }
            }
            Ok(IngestOutcome::Skipped { reason }) => {
                warn!(
                    "Not loading {} upload {:?}: {reason}",
                    record.kind, record.name
                );
            }
            Err(e) => {
                error!(
                    "Error processing {} upload {:?}: {e:?}",
                    record.kind, record.name
                );
            }
        }
    }
}
