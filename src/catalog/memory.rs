use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CatalogError, CatalogResult, DataStore, FeatureType, LayerCatalog};

#[derive(Debug, Default)]
struct MemoryCatalogState {
    workspaces: BTreeSet<String>,
    stores: BTreeMap<(String, String), DataStore>,
    layers: BTreeMap<(String, String), FeatureType>,
    refreshes: usize,
}

/// A catalog that only keeps track of what it's been asked to do
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<MemoryCatalogState>,
    failure: Option<String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog whose every call fails with the given reason
    pub fn failing(reason: &str) -> Self {
        Self {
            state: Mutex::default(),
            failure: Some(reason.to_string()),
        }
    }

    pub fn workspaces(&self) -> Vec<String> {
        self.state.lock().workspaces.iter().cloned().collect()
    }

    pub fn store(&self, workspace: &str, name: &str) -> Option<DataStore> {
        self.state
            .lock()
            .stores
            .get(&(workspace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn layer(&self, workspace: &str, name: &str) -> Option<FeatureType> {
        self.state
            .lock()
            .layers
            .get(&(workspace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn layer_count(&self) -> usize {
        self.state.lock().layers.len()
    }

    pub fn refresh_count(&self) -> usize {
        self.state.lock().refreshes
    }

    fn check(&self) -> CatalogResult<()> {
        match &self.failure {
            Some(reason) => Err(CatalogError::Generic {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LayerCatalog for MemoryCatalog {
    async fn ensure_workspace(&self, workspace: &str) -> CatalogResult<()> {
        self.check()?;
        self.state.lock().workspaces.insert(workspace.to_string());
        Ok(())
    }

    async fn create_datastore(
        &self,
        workspace: &str,
        store: &DataStore,
    ) -> CatalogResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let key = (workspace.to_string(), store.name.clone());
        if state.stores.contains_key(&key) {
            return Err(CatalogError::UnexpectedStatus {
                status: 409,
                url: format!("memory://{workspace}/{}", store.name),
                body: format!("Store '{}' already exists", store.name),
            });
        }
        state.stores.insert(key, store.clone());
        Ok(())
    }

    async fn publish_layer(
        &self,
        workspace: &str,
        store_name: &str,
        feature_type: &FeatureType,
    ) -> CatalogResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        if !state
            .stores
            .contains_key(&(workspace.to_string(), store_name.to_string()))
        {
            return Err(CatalogError::UnexpectedStatus {
                status: 404,
                url: format!("memory://{workspace}/{store_name}"),
                body: format!("No such data store: {workspace},{store_name}"),
            });
        }
        let key = (workspace.to_string(), feature_type.name.clone());
        if state.layers.contains_key(&key) {
            return Err(CatalogError::UnexpectedStatus {
                status: 500,
                url: format!("memory://{workspace}/{store_name}/{}", feature_type.name),
                body: format!(
                    "Resource named '{}' already exists in store: '{store_name}'",
                    feature_type.name
                ),
            });
        }
        state.layers.insert(key, feature_type.clone());
        Ok(())
    }

    async fn refresh_layer(
        &self,
        workspace: &str,
        store_name: &str,
        feature_type: &FeatureType,
    ) -> CatalogResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let key = (workspace.to_string(), feature_type.name.clone());
        match state.layers.get_mut(&key) {
            Some(layer) => {
                *layer = feature_type.clone();
                state.refreshes += 1;
                Ok(())
            }
            None => Err(CatalogError::UnexpectedStatus {
                status: 404,
                url: format!("memory://{workspace}/{store_name}/{}", feature_type.name),
                body: format!("No such feature type: {}", feature_type.name),
            }),
        }
    }

    async fn delete_datastore(
        &self,
        workspace: &str,
        store_name: &str,
    ) -> CatalogResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        let removed = state
            .stores
            .remove(&(workspace.to_string(), store_name.to_string()));
        if removed.is_none() {
            return Err(CatalogError::UnexpectedStatus {
                status: 404,
                url: format!("memory://{workspace}/{store_name}"),
                body: format!("No such data store: {workspace},{store_name}"),
            });
        }

        // Layers published from this store go with it. Layers here are always
        // named after their store.
        state
            .layers
            .remove(&(workspace.to_string(), store_name.to_string()));
        Ok(())
    }
}
