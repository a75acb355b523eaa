//! SQLite backend implementation — the embedded, file-based stand-in for
//! an H2-style database.
//!
//! # Example
//!
//! ```no_run
//! use fhir_persistence::backends::sqlite::SqliteBackend;
//! use fhir_persistence::backends::Backend;
//!
//! # async fn run() -> Result<(), fhir_persistence::error::StoreError> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.bootstrap().await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod schema;

pub use backend::{SqliteBackend, SqliteBackendConfig};
