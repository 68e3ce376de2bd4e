//! Session store implementations for FileScout.

pub mod file_store;
pub mod in_memory;

pub use file_store::FileStore;
pub use in_memory::InMemoryStore;

use filescout_config::{SessionBackend, SessionsSettings};
use filescout_core::store::SessionStore;
use std::sync::Arc;

/// Build the store selected by configuration.
pub fn store_from_settings(settings: &SessionsSettings) -> Arc<dyn SessionStore> {
    match settings.backend {
        SessionBackend::Memory => Arc::new(InMemoryStore::new()),
        SessionBackend::File => Arc::new(FileStore::new(settings.resolved_dir())),
    }
}
