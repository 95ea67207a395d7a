use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;

pub mod geoserver;
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog request to {url} failed with status {status}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Catalog base URL {url:?} can't have path segments appended")]
    InvalidBaseUrl { url: String },

    #[error("{reason}")]
    Generic { reason: String },

    #[error(transparent)]
    HttpClientError(#[from] reqwest::Error),

    #[error("Failed parsing URL: {0}")]
    UrlParseError(#[from] url::ParseError),
}

pub type CatalogResult<T, E = CatalogError> = Result<T, E>;

impl CatalogError {
    /// GeoServer reports an existing store or layer as 409 on recent versions
    /// and as a 500 with an "already exists" message on older ones.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CatalogError::UnexpectedStatus { status, body, .. }
            if *status == 409 || body.contains("already exists"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::UnexpectedStatus { status: 404, .. })
    }
}

/// Connection parameters GeoServer uses to reach the spatial database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostGisConnection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataStore {
    pub name: String,
    pub connection: PostGisConnection,
}

/// A layer backed by a database table. `native_name` is the table, `name` is
/// what the layer is published as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureType {
    pub name: String,
    pub native_name: String,
}

/// An external map-serving catalog that can publish database tables as layers
#[async_trait]
pub trait LayerCatalog: Send + Sync + Debug {
    /// Create the workspace unless it's already there
    async fn ensure_workspace(&self, workspace: &str) -> CatalogResult<()>;

    async fn create_datastore(
        &self,
        workspace: &str,
        store: &DataStore,
    ) -> CatalogResult<()>;

    async fn publish_layer(
        &self,
        workspace: &str,
        store_name: &str,
        feature_type: &FeatureType,
    ) -> CatalogResult<()>;

    /// Re-read an already published layer from its table, so that a replaced
    /// table's bounds show up in the catalog
    async fn refresh_layer(
        &self,
        workspace: &str,
        store_name: &str,
        feature_type: &FeatureType,
    ) -> CatalogResult<()>;

    /// Delete a data store along with every layer published from it
    async fn delete_datastore(&self, workspace: &str, store_name: &str)
        -> CatalogResult<()>;
}
