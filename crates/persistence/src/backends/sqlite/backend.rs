//! SQLite backend implementation.

use std::path::Path;

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backends::{Backend, ColumnCache, Row};
use crate::error::{StoreError, StoreResult};
use crate::naming;
use crate::types::SearchParamType;

use super::schema;

/// SQLite backend for FHIR resource storage.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    column_cache: ColumnCache,
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
    /// Enable WAL mode for better concurrency (file-backed databases only).
    #[serde(default = "default_true")]
    pub enable_wal: bool,
    /// Enable foreign key enforcement.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteBackendConfig) -> StoreResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .build(manager)
            .map_err(|e| StoreError::Internal(format!("failed to build sqlite pool: {e}")))?;

        let backend = Self {
            pool,
            config,
            is_memory,
            column_cache: ColumnCache::new(),
        };
        backend.configure_connection()?;
        Ok(backend)
    }

    fn configure_connection(&self) -> StoreResult<()> {
        let conn = self.get_connection()?;
        conn.busy_timeout(std::time::Duration::from_millis(self.config.busy_timeout_ms as u64))
            .map_err(|e| StoreError::Internal(format!("failed to set busy timeout: {e}")))?;
        if self.config.enable_foreign_keys {
            conn.execute("PRAGMA foreign_keys = ON", [])
                .map_err(|e| StoreError::Internal(format!("failed to enable foreign keys: {e}")))?;
        }
        if self.config.enable_wal && !self.is_memory {
            conn.execute("PRAGMA journal_mode = WAL", [])
                .map_err(|e| StoreError::Internal(format!("failed to enable WAL mode: {e}")))?;
        }
        Ok(())
    }

    fn get_connection(&self) -> StoreResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| StoreError::Internal(format!("failed to acquire sqlite connection: {e}")))
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn bootstrap(&self) -> StoreResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    async fn ensure_resource_table(
        &self,
        resource_type: &str,
        columns: &[(String, SearchParamType)],
    ) -> StoreResult<()> {
        let conn = self.get_connection()?;
        schema::ensure_resource_table(&conn, resource_type, columns)?;
        self.column_cache.invalidate(&naming::table_name(resource_type));
        Ok(())
    }

    async fn execute(&self, sql: &str) -> StoreResult<u64> {
        let conn = self.get_connection()?;
        let affected = conn
            .execute(sql, [])
            .map_err(|e| StoreError::Internal(format!("sqlite execute failed: {e} ({sql})")))?;
        Ok(affected as u64)
    }

    async fn query(&self, sql: &str) -> StoreResult<Vec<Row>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::Internal(format!("sqlite prepare failed: {e} ({sql})")))?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut map = Map::new();
                for (idx, name) in column_names.iter().enumerate() {
                    let value = match row.get_ref(idx)? {
                        ValueRef::Null => Value::Null,
                        ValueRef::Integer(i) => Value::Number(i.into()),
                        ValueRef::Real(f) => serde_json::Number::from_f64(f)
                            .map(Value::Number)
                            .unwrap_or(Value::Null),
                        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
                        ValueRef::Blob(b) => {
                            Value::String(b.iter().map(|byte| format!("{byte:02x}")).collect())
                        }
                    };
                    map.insert(name.clone(), value);
                }
                Ok(map)
            })
            .map_err(|e| StoreError::Internal(format!("sqlite query failed: {e} ({sql})")))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Internal(format!("sqlite row decode failed: {e}")))
    }

    async fn table_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        if let Some(cached) = self.column_cache.get(table) {
            return Ok(cached);
        }
        let conn = self.get_connection()?;
        let columns = schema::table_columns(&conn, table)?;
        self.column_cache.put(table, columns.clone());
        Ok(columns)
    }

    fn format_blob_literal(&self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("X'{hex}'")
    }

    async fn clear_all(&self, resource_types: &[String]) -> StoreResult<()> {
        let conn = self.get_connection()?;
        for resource_type in resource_types {
            let table = naming::table_name(resource_type);
            let _ = conn.execute(&format!("DELETE FROM {table}"), []);
        }
        conn.execute("DELETE FROM \"REFERENCES\"", [])
            .map_err(|e| StoreError::Internal(format!("failed to clear REFERENCES: {e}")))?;
        conn.execute("DELETE FROM RESOURCE_HISTORY", [])
            .map_err(|e| StoreError::Internal(format!("failed to clear RESOURCE_HISTORY: {e}")))?;
        conn.execute("DELETE FROM CUSTOM_EXTENSION_SEARCH_PARAMS", [])
            .map_err(|e| StoreError::Internal(format!("failed to clear CUSTOM_EXTENSION_SEARCH_PARAMS: {e}")))?;
        conn.execute("DELETE FROM SEARCH_PARAM_RES_EXPRESSIONS WHERE IS_CUSTOM = TRUE", [])
            .map_err(|e| StoreError::Internal(format!("failed to clear custom catalog rows: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_fixed_tables() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.bootstrap().await.unwrap();
        backend.bootstrap().await.unwrap(); // idempotent
    }

    #[tokio::test]
    async fn ensure_resource_table_then_query_round_trips() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.bootstrap().await.unwrap();
        backend
            .ensure_resource_table("Patient", &[("gender".to_string(), SearchParamType::Token)])
            .await
            .unwrap();
        backend
            .execute("INSERT INTO PatientTable (PATIENTTABLE_ID, VERSION_ID, CREATED_AT, LAST_UPDATED, CONTENT, GENDER) VALUES ('1', 1, '2024-01-01 00:00:00.000', '2024-01-01 00:00:00.000', '{}', 'male')")
            .await
            .unwrap();
        let rows = backend.query("SELECT GENDER FROM PatientTable").await.unwrap();
        assert_eq!(rows[0].get("GENDER").unwrap().as_str(), Some("male"));
    }

    #[tokio::test]
    async fn table_columns_are_cached() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.bootstrap().await.unwrap();
        backend.ensure_resource_table("Patient", &[]).await.unwrap();
        let columns = backend.table_columns("PatientTable").await.unwrap();
        assert!(columns.contains(&"CONTENT".to_string()));
    }
}
