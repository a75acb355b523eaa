//! FHIR R4 storage and search engine.
//!
//! This crate implements the storage core of a FHIR R4 resource server: a
//! relational schema used both as a document store (canonical resource JSON
//! in a blob column) and a search index (search parameters materialised
//! into typed columns and side tables), plus a reference graph that keeps
//! cross-resource queries, `_include`/`_revinclude`, and cascading deletes
//! off the blob entirely.
//!
//! # Architecture
//!
//! - [`naming`] — deterministic table/column naming and SQL literal
//!   formatting (the only place that builds SQL fragments from values).
//! - [`backends`] — the SQL adapter: schema bootstrap, column
//!   introspection, and dialect differences between SQLite and PostgreSQL.
//! - [`references`] — the reference edge store.
//! - [`catalog`] — the search-parameter catalog, seeded from a bundled CSV
//!   and mutated by `SearchParameter` resources.
//! - [`fhirpath`] — a narrow FHIRPath evaluator: the single contract is
//!   `(resource, expression) -> Vec<Value>`.
//! - [`extractor`] — mines indexable values out of a resource using the
//!   catalog and FHIRPath.
//! - [`history`] — the append-only version-history log.
//! - [`transaction`] — the per-request compensating-transaction controller.
//! - [`engine`] — the create/update/patch/delete/read/search engines that
//!   orchestrate everything above.
//!
//! # Quick start
//!
//! ```no_run
//! use fhir_persistence::backends::sqlite::SqliteBackend;
//! use fhir_persistence::engine::Store;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), fhir_persistence::error::StoreError> {
//! let backend = SqliteBackend::in_memory()?;
//! let store = Store::new(std::sync::Arc::new(backend), Default::default());
//! let created = store.create("Patient", json!({
//!     "resourceType": "Patient",
//!     "name": [{"family": "Doe", "given": ["Jane"]}]
//! })).await?;
//! assert_eq!(created.version_id(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fhirpath;
pub mod history;
pub mod naming;
pub mod references;
pub mod transaction;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use types::StoredResource;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
