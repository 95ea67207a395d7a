use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::catalog::{
    CatalogResult, DataStore, FeatureType, LayerCatalog, PostGisConnection,
};
use crate::config::schema::GridAtlasConfig;
use crate::data_types::{UploadKind, UploadRecord};
use crate::lifecycle::{superseded, RecordLifecycle};
use crate::repository::interface::Repository;

/// Publishes derived GeoJSON tables as layers of one catalog workspace. Each
/// upload gets a data store and a layer named after it.
#[derive(Debug)]
pub struct CatalogPublisher {
    catalog: Arc<dyn LayerCatalog>,
    workspace: String,
    connection: PostGisConnection,
}

impl CatalogPublisher {
    pub fn new(
        catalog: Arc<dyn LayerCatalog>,
        workspace: &str,
        connection: PostGisConnection,
    ) -> Self {
        Self {
            catalog,
            workspace: workspace.to_string(),
            connection,
        }
    }

    pub fn from_config(catalog: Arc<dyn LayerCatalog>, config: &GridAtlasConfig) -> Self {
        let database = &config.database;
        Self::new(
            catalog,
            &config.geoserver.workspace,
            PostGisConnection {
                host: database.host.clone(),
                port: database.port,
                database: database.name.clone(),
                user: database.user.clone(),
                password: database.password.clone(),
                schema: database.schema.clone(),
            },
        )
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub async fn publish(&self, name: &str, table: &str) -> CatalogResult<()> {
        self.catalog.ensure_workspace(&self.workspace).await?;

        let store = DataStore {
            name: name.to_string(),
            connection: self.connection.clone(),
        };
        match self.catalog.create_datastore(&self.workspace, &store).await {
            Ok(()) => debug!("Created data store {name:?}"),
            Err(e) if e.is_already_exists() => debug!("Reusing data store {name:?}"),
            Err(e) => return Err(e),
        }

        let feature_type = FeatureType {
            name: name.to_string(),
            native_name: table.to_string(),
        };
        match self
            .catalog
            .publish_layer(&self.workspace, name, &feature_type)
            .await
        {
            Err(e) if e.is_already_exists() => {
                debug!("Layer {name:?} already published, refreshing it");
                self.catalog
                    .refresh_layer(&self.workspace, name, &feature_type)
                    .await
            }
            other => other,
        }
    }

    /// Publish, logging the result instead of returning it
    pub async fn publish_logged(&self, name: &str, table: &str) {
        match self.publish(name, table).await {
            Ok(()) => info!(
                "Published table {table:?} as layer {}:{name}",
                self.workspace
            ),
            Err(e) => error!("Error publishing table {table:?} as layer {name:?}: {e}"),
        }
    }

    /// Remove the data store (and its layers) for an upload. A store that's
    /// already gone counts as removed.
    pub async fn unpublish(&self, name: &str) -> CatalogResult<()> {
        match self.catalog.delete_datastore(&self.workspace, name).await {
            Err(e) if e.is_not_found() => {
                debug!("Data store {name:?} was already gone");
                Ok(())
            }
            other => other,
        }
    }
}

/// Removes the catalog entries of deleted GeoJSON uploads
#[derive(Debug)]
pub struct CatalogCleanup {
    publisher: Arc<CatalogPublisher>,
    repository: Arc<dyn Repository>,
}

impl CatalogCleanup {
    pub fn new(publisher: Arc<CatalogPublisher>, repository: Arc<dyn Repository>) -> Self {
        Self {
            publisher,
            repository,
        }
    }
}

#[async_trait]
impl RecordLifecycle for CatalogCleanup {
    async fn on_record_deleted(&self, record: &UploadRecord) {
        if record.kind != UploadKind::GeoJson {
            return;
        }
        if superseded(self.repository.as_ref(), record).await {
            info!("Keeping layer {:?}, a newer upload publishes it", record.name);
            return;
        }

        match self.publisher.unpublish(&record.name).await {
            Ok(()) => info!("Removed layer {:?} from the catalog", record.name),
            Err(e) => error!("Error removing layer {:?} from the catalog: {e}", record.name),
        }
    }
}
