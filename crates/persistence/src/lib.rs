//! State persistence for the support bot
//!
//! Backends for the [`StateStore`] boundary:
//! - [`InMemoryStateStore`]: process memory, lost on restart
//! - [`FileStateStore`]: one JSON document per scope and id
//! - [`SelectiveStore`]: keeps scopes configured as non-persistent in memory
//!   and forwards the rest to a durable backend

pub mod file;
pub mod memory;
pub mod selective;

pub use file::FileStateStore;
pub use memory::InMemoryStateStore;
pub use selective::SelectiveStore;

use std::sync::Arc;

use supportbot_config::{PersistenceBackend, PersistenceConfig};
use supportbot_core::{StateStore, StoreError};

/// Build the store described by configuration
pub async fn build_store(config: &PersistenceConfig) -> Result<Arc<dyn StateStore>, StoreError> {
    let store: Arc<dyn StateStore> = match config.backend {
        PersistenceBackend::Memory => return Ok(Arc::new(InMemoryStateStore::new())),
        PersistenceBackend::File => Arc::new(FileStateStore::open(&config.directory).await?),
    };

    if config.persist_user_data && config.persist_conversation_data {
        return Ok(store);
    }
    Ok(Arc::new(SelectiveStore::new(store, config)))
}
