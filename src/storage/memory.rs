//! In-memory storage backend.
//!
//! All `memory://` providers in a process share one store, so objects put
//! through one provider can be read back through another. Keys under
//! `memory://<prefix>` live under `<prefix>/` in that store.

use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path;
use std::sync::{Arc, LazyLock};

use super::{BackendConfig, StorageProvider};

static SHARED_STORE: LazyLock<Arc<InMemory>> = LazyLock::new(|| Arc::new(InMemory::new()));

/// In-memory store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) fn construct_memory(config: MemoryConfig) -> Self {
        let object_store: Arc<dyn ObjectStore> = SHARED_STORE.clone();
        let canonical_url = match &config.key {
            Some(key) => format!("memory://{key}"),
            None => "memory://".to_string(),
        };

        Self {
            config: BackendConfig::Memory(config),
            object_store,
            canonical_url,
        }
    }
}
