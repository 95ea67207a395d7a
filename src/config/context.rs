use std::sync::Arc;

use tracing::info;

use crate::auth::AccessPolicy;
use crate::catalog::geoserver::GeoServerCatalog;
use crate::catalog::{CatalogError, LayerCatalog};
use crate::context::GridAtlasContext;
use crate::ingest::IngestionPipeline;
use crate::media::MediaStore;
use crate::publish::{CatalogCleanup, CatalogPublisher};
use crate::repository::interface::Repository;
use crate::repository::postgres::PostgresRepository;
use crate::teardown::TeardownHandler;
use crate::uploads::UploadService;

use super::schema::GridAtlasConfig;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Error setting up the database: {0}")]
    Repository(#[from] crate::repository::interface::Error),

    #[error("Error setting up the GeoServer client: {0}")]
    Catalog(#[from] CatalogError),
}

/// Wire the upload lifecycle together: ingestion (and publication) on
/// create, table teardown on delete, and catalog cleanup if it's enabled.
pub fn assemble_context(
    config: GridAtlasConfig,
    repository: Arc<dyn Repository>,
    catalog: Arc<dyn LayerCatalog>,
) -> GridAtlasContext {
    let media = Arc::new(MediaStore::new(&config.uploads.media_dir));
    let publisher = Arc::new(CatalogPublisher::from_config(catalog, &config));

    let pipeline = IngestionPipeline::new(repository.clone(), media.clone(), config.misc.srid)
        .with_publisher(publisher.clone());

    let mut uploads = UploadService::new(repository.clone(), media)
        .with_handler(Arc::new(pipeline))
        .with_handler(Arc::new(TeardownHandler::new(repository.clone())));
    if config.misc.cleanup_catalog_on_delete {
        uploads = uploads.with_handler(Arc::new(CatalogCleanup::new(publisher, repository.clone())));
    }

    GridAtlasContext {
        access_policy: AccessPolicy::from_config(&config.frontend.http),
        config,
        repository,
        uploads,
    }
}

pub async fn build_context(config: GridAtlasConfig) -> Result<GridAtlasContext, ContextError> {
    let repository = Arc::new(
        PostgresRepository::try_new(
            config.database.dsn.clone(),
            config.database.schema.clone(),
        )
        .await?,
    );
    info!(
        "Connected to the database, using schema {:?}",
        config.database.schema
    );

    let catalog = Arc::new(GeoServerCatalog::from_config(&config.geoserver)?);

    Ok(assemble_context(config, repository, catalog))
}
