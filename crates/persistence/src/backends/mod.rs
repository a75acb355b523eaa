//! The SQL adapter (C1): the narrow surface every other component talks to
//! the database through.
//!
//! A [`Backend`] hides dialect differences between the embedded file
//! database (SQLite — this crate's stand-in for an H2-style embedded
//! engine) and a networked SQL server (PostgreSQL) behind schema bootstrap,
//! query execution, column introspection, and binary-literal formatting.
//! Every SQL fragment is built by [`crate::naming`] before it reaches a
//! `Backend` — backends never interpret values, only dialect.

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::StoreResult;

/// One row returned from a query, keyed by column name. Column name casing
/// matches whatever the backend reports (both backends here report
/// upper-case names, matching the schema's `UPPER_SNAKE_CASE` convention).
pub type Row = Map<String, Value>;

/// Database backends supported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded file database (SQLite, standing in for H2).
    Sqlite,
    /// Networked PostgreSQL server.
    Postgres,
}

impl BackendKind {
    /// Parses the `h2`/`postgresql` configuration surface names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "h2" | "sqlite" => Some(Self::Sqlite),
            "postgresql" | "postgres" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// The SQL adapter trait (C1). Implemented once per backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable backend name, used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Runs the bundled DDL to create `REFERENCES`,
    /// `SEARCH_PARAM_RES_EXPRESSIONS`, `CUSTOM_EXTENSION_SEARCH_PARAMS`, and
    /// `RESOURCE_HISTORY`, then seeds the standard search-parameter catalog
    /// from the bundled CSV if the catalog table is empty.
    async fn bootstrap(&self) -> StoreResult<()>;

    /// Creates `<Type>Table` if it does not already exist, with the
    /// standard metadata columns plus one typed column per standard
    /// (non-custom) catalog row for this resource type.
    async fn ensure_resource_table(
        &self,
        resource_type: &str,
        columns: &[(String, crate::types::SearchParamType)],
    ) -> StoreResult<()>;

    /// Executes a statement built entirely of SQL literals (no bind
    /// parameters — see module docs) and returns the number of affected
    /// rows.
    async fn execute(&self, sql: &str) -> StoreResult<u64>;

    /// Executes a query and returns every row, one [`Row`] map per result.
    async fn query(&self, sql: &str) -> StoreResult<Vec<Row>>;

    /// Returns the live column list of `table`, consulting the shared
    /// in-process cache first (see [`ColumnCache`]).
    async fn table_columns(&self, table: &str) -> StoreResult<Vec<String>>;

    /// Formats a byte blob as a backend-specific SQL literal: a hex-literal
    /// prefix for SQLite (`X'...'`), a decode-function call for PostgreSQL
    /// (`decode('...', 'hex')`).
    fn format_blob_literal(&self, bytes: &[u8]) -> String;

    /// Mass-clears all resource and index data (used when
    /// `clearDataOnStartup` is configured). SQLite truncates every table
    /// directly; PostgreSQL issues `TRUNCATE ... CASCADE`.
    async fn clear_all(&self, resource_types: &[String]) -> StoreResult<()>;
}

/// Per-table column list cache shared by a backend instance, replacing the
/// whole entry for a table on miss rather than merging.
#[derive(Default)]
pub struct ColumnCache {
    inner: RwLock<HashMap<String, Vec<String>>>,
}

impl ColumnCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached column list for `table`, if any.
    pub fn get(&self, table: &str) -> Option<Vec<String>> {
        self.inner.read().get(table).cloned()
    }

    /// Replaces the cached column list for `table`.
    pub fn put(&self, table: &str, columns: Vec<String>) {
        self.inner.write().insert(table.to_string(), columns);
    }

    /// Drops the cached entry for `table`, forcing the next lookup to
    /// re-introspect.
    pub fn invalidate(&self, table: &str) {
        self.inner.write().remove(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_configuration_names() {
        assert_eq!(BackendKind::parse("h2"), Some(BackendKind::Sqlite));
        assert_eq!(BackendKind::parse("postgresql"), Some(BackendKind::Postgres));
        assert_eq!(BackendKind::parse("oracle"), None);
    }

    #[test]
    fn column_cache_replaces_whole_entry() {
        let cache = ColumnCache::new();
        cache.put("PatientTable", vec!["A".into(), "B".into()]);
        cache.put("PatientTable", vec!["C".into()]);
        assert_eq!(cache.get("PatientTable"), Some(vec!["C".to_string()]));
    }

    #[test]
    fn column_cache_invalidate_clears_entry() {
        let cache = ColumnCache::new();
        cache.put("PatientTable", vec!["A".into()]);
        cache.invalidate("PatientTable");
        assert_eq!(cache.get("PatientTable"), None);
    }
}
