use std::sync::Arc;

use crate::auth::AccessPolicy;
use crate::config::schema::GridAtlasConfig;
use crate::repository::interface::Repository;
use crate::uploads::UploadService;

/// Everything a request handler needs, built once at startup
#[derive(Debug)]
pub struct GridAtlasContext {
    pub config: GridAtlasConfig,
    pub repository: Arc<dyn Repository>,
    pub uploads: UploadService,
    pub access_policy: AccessPolicy,
}

#[cfg(test)]
pub mod test_utils {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::GridAtlasContext;
    use crate::catalog::memory::MemoryCatalog;
    use crate::config::context::assemble_context;
    use crate::config::schema::{load_config_from_string, tests::TEST_CONFIG_BASIC};
    use crate::repository::memory::InMemoryRepository;

    pub struct TestContext {
        pub context: Arc<GridAtlasContext>,
        pub repository: Arc<InMemoryRepository>,
        pub catalog: Arc<MemoryCatalog>,
        pub media_dir: TempDir,
    }

    /// A context over in-memory storage, with the write password from the
    /// basic test config ("write_password")
    pub fn in_memory_context(repository: InMemoryRepository) -> TestContext {
        let media_dir = tempfile::tempdir().unwrap();
        let mut config = load_config_from_string(TEST_CONFIG_BASIC, false).unwrap();
        config.uploads.media_dir = media_dir.path().to_string_lossy().to_string();

        let repository = Arc::new(repository);
        let catalog = Arc::new(MemoryCatalog::new());
        let context = Arc::new(assemble_context(config, repository.clone(), catalog.clone()));

        TestContext {
            context,
            repository,
            catalog,
            media_dir,
        }
    }
}
