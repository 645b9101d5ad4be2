//! Global singletons.

pub mod config;

use cardsmith_core::persist::autosave::{DirectoryStore, KeyValueStore, MemoryStore};

pub type SharedStore = std::sync::Arc<dyn KeyValueStore + Send + Sync>;

/// Get the shared autosave store. Falls back to memory, and so to no recovery, if the data
/// directory is unusable.
pub fn autosave_store() -> &'static SharedStore {
    static STORE: std::sync::OnceLock<SharedStore> = std::sync::OnceLock::new();
    STORE.get_or_init(|| {
        let Some(dir) = config::Config::get().data_dir() else {
            log::warn!("No data dir found, autosave is disabled.");
            return std::sync::Arc::new(MemoryStore::default());
        };
        match DirectoryStore::open(&dir) {
            Ok(store) => {
                log::info!("Autosaving to {}", store.root().display());
                std::sync::Arc::new(store)
            }
            Err(e) => {
                log::error!("Failed to open autosave store at {dir:?}: {e}");
                std::sync::Arc::new(MemoryStore::default())
            }
        }
    })
}
