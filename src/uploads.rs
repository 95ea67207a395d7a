use std::sync::Arc;

use tracing::{info, warn};

use crate::data_types::{NewUploadRecord, UploadId, UploadKind, UploadRecord};
use crate::lifecycle::RecordLifecycle;
use crate::media::MediaStore;
use crate::repository::interface::Repository;

pub const MAX_NAME_LENGTH: usize = 100;

/// Postgres truncates longer identifiers
const MAX_IDENTIFIER_BYTES: usize = 63;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid upload name: {reason}")]
    InvalidName { reason: String },

    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("Error storing upload file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    RepositoryError(#[from] crate::repository::interface::Error),
}

/// A new upload as submitted by an administrator
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub kind: UploadKind,
    pub name: String,
    /// Original file name and contents
    pub file: Option<(String, Vec<u8>)>,
    /// WKT
    pub geometry: Option<String>,
}

pub fn validate_name(kind: UploadKind, name: &str) -> Result<(), UploadError> {
    let invalid = |reason: &str| {
        Err(UploadError::InvalidName {
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return invalid("the name can't be empty");
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return invalid(&format!("the name can't be longer than {MAX_NAME_LENGTH} characters"));
    }
    if name.chars().any(char::is_control) {
        return invalid("the name can't contain control characters");
    }
    if kind.table_name(name).len() > MAX_IDENTIFIER_BYTES {
        return invalid(&format!(
            "the table name {:?} would be longer than {MAX_IDENTIFIER_BYTES} bytes",
            kind.table_name(name)
        ));
    }

    Ok(())
}

fn validate_geometry(geometry: &str) -> Result<(), UploadError> {
    geometry
        .parse::<wkt::Wkt<f64>>()
        .map(|_| ())
        .map_err(|reason| UploadError::InvalidGeometry {
            reason: reason.to_string(),
        })
}

/// Creates and deletes upload records, storing their files and running every
/// registered lifecycle handler in registration order.
#[derive(Debug)]
pub struct UploadService {
    repository: Arc<dyn Repository>,
    media: Arc<MediaStore>,
    handlers: Vec<Arc<dyn RecordLifecycle>>,
}

impl UploadService {
    pub fn new(repository: Arc<dyn Repository>, media: Arc<MediaStore>) -> Self {
        Self {
            repository,
            media,
            handlers: vec![],
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn RecordLifecycle>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub async fn create(&self, upload: NewUpload) -> Result<UploadRecord, UploadError> {
        validate_name(upload.kind, &upload.name)?;
        let geometry = upload.geometry.filter(|g| !g.trim().is_empty());
        if let Some(geometry) = &geometry {
            validate_geometry(geometry)?;
        }

        let file = match &upload.file {
            Some((file_name, data)) => {
                Some(self.media.save(upload.kind, file_name, data).await?)
            }
            None => None,
        };

        let record = match self
            .repository
            .create_upload(&NewUploadRecord {
                kind: upload.kind,
                name: upload.name,
                file: file.clone(),
                geometry,
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                if let Some(file) = &file {
                    if let Err(e) = self.media.remove(file).await {
                        warn!("Error removing orphaned upload file {file:?}: {e}");
                    }
                }
                return Err(e.into());
            }
        };
        info!(
            "Created {} upload {} ({:?})",
            record.kind, record.id, record.name
        );

        for handler in &self.handlers {
            handler.on_record_created(&record).await;
        }

        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<UploadRecord>, UploadError> {
        Ok(self.repository.list_uploads().await?)
    }

    pub async fn get(&self, id: UploadId) -> Result<Option<UploadRecord>, UploadError> {
        Ok(self.repository.get_upload(id).await?)
    }

    /// Returns the deleted record, or `None` if there was no such record
    pub async fn delete(&self, id: UploadId) -> Result<Option<UploadRecord>, UploadError> {
        let record = match self.repository.delete_upload(id).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        info!(
            "Deleted {} upload {} ({:?})",
            record.kind, record.id, record.name
        );

        for handler in &self.handlers {
            handler.on_record_deleted(&record).await;
        }

        if let Some(file) = &record.file {
            if let Err(e) = self.media.remove(file).await {
                warn!("Error removing upload file {file:?}: {e}");
            }
        }

        Ok(Some(record))
    }
}
