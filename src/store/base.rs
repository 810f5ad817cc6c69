use std::sync::Arc;

use tracing::info;

use super::{file_store::FileStorage, memory_store::MemoryStorage};
use crate::config::{StoreBackend, StoreConfig};

/// Session-scoped key/value storage for string records.
///
/// Mirrors what a browser tab offers: get, set and remove by key. Nothing
/// stored here is expected to outlive the user's login session.
pub trait Storage: Send + Sync {
    fn get_name(&self) -> &str;
    fn get_item(&self, key: &str) -> Result<Option<String>, String>;
    /// Replaces any existing value in one step; readers never see a partial write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), String>;
    /// Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), String>;
}

/// Creates a concrete storage backend from the StoreConfig.
pub fn create_storage(config: &StoreConfig) -> Result<Arc<dyn Storage>, String> {
    match &config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory token storage; tokens end with the process.");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StoreBackend::SessionFile(file_config) => {
            let storage = match &file_config.directory {
                Some(dir) => FileStorage::new(dir.clone()),
                None => FileStorage::in_runtime_dir(),
            }?;
            info!(
                "Using session file token storage at '{}'.",
                storage.directory().display()
            );
            Ok(Arc::new(storage))
        }
    }
}
