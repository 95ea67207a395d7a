use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::data_types::UploadKind;
use crate::utils::sanitize_file_name;

/// Local directory holding the raw files behind upload records. Records refer
/// to their file by its path relative to the root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a new blob under the kind's directory, returning its relative path.
    /// Names get a random prefix so that re-uploads never clobber each other.
    pub async fn save(
        &self,
        kind: UploadKind,
        file_name: &str,
        data: &[u8],
    ) -> std::io::Result<String> {
        let relative = format!(
            "{}/{}-{}",
            kind.blob_dir(),
            Uuid::new_v4().simple(),
            sanitize_file_name(file_name)
        );

        let path = self.path(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        debug!("Stored {} bytes at {path:?}", data.len());

        Ok(relative)
    }

    pub async fn read(&self, relative: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.path(relative)).await
    }

    /// Delete a blob. A blob that's already gone isn't an error.
    pub async fn remove(&self, relative: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path(relative)).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
