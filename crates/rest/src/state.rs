//! Shared application state handed to every handler.

use std::sync::Arc;

use fhir_persistence::engine::Store;

/// Shared state behind every route: the storage engine, already bootstrapped.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
}

impl AppState {
    /// Wraps a bootstrapped [`Store`].
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The storage and search engine.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The base URL bundles and `Location` headers are built against.
    pub fn base_url(&self) -> &str {
        &self.store.config().base_url
    }
}
