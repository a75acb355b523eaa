//! PostgreSQL backend implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_types::Type as PgType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_postgres::NoTls;

use crate::backends::{Backend, ColumnCache, Row};
use crate::error::{StoreError, StoreResult};
use crate::naming;
use crate::types::SearchParamType;

use super::schema;

/// Configuration for the PostgreSQL backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresBackendConfig {
    /// PostgreSQL host.
    #[serde(default = "default_host")]
    pub host: String,
    /// PostgreSQL port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    #[serde(default = "default_dbname")]
    pub dbname: String,
    /// Database user.
    #[serde(default = "default_user")]
    pub user: String,
    /// Database password.
    #[serde(default)]
    pub password: Option<String>,
    /// Maximum pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_dbname() -> String {
    "fhirserv".to_string()
}
fn default_user() -> String {
    "fhirserv".to_string()
}
fn default_max_connections() -> usize {
    10
}

impl Default for PostgresBackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: None,
            max_connections: default_max_connections(),
        }
    }
}

/// PostgreSQL backend for FHIR resource storage.
pub struct PostgresBackend {
    pool: Pool,
    column_cache: ColumnCache,
}

impl PostgresBackend {
    /// Connects to PostgreSQL with the given configuration.
    pub fn connect(config: PostgresBackendConfig) -> StoreResult<Self> {
        let mut pool_config = PoolConfig::new();
        pool_config.host = Some(config.host);
        pool_config.port = Some(config.port);
        pool_config.dbname = Some(config.dbname);
        pool_config.user = Some(config.user);
        pool_config.password = config.password;
        pool_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Internal(format!("failed to build postgres pool: {e}")))?;

        Ok(Self {
            pool,
            column_cache: ColumnCache::new(),
        })
    }

    async fn client(&self) -> StoreResult<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Internal(format!("failed to acquire postgres connection: {e}")))
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn bootstrap(&self) -> StoreResult<()> {
        let client = self.client().await?;
        schema::initialize_schema(&client).await
    }

    async fn ensure_resource_table(
        &self,
        resource_type: &str,
        columns: &[(String, SearchParamType)],
    ) -> StoreResult<()> {
        let client = self.client().await?;
        schema::ensure_resource_table(&client, resource_type, columns).await?;
        self.column_cache.invalidate(&naming::table_name(resource_type));
        Ok(())
    }

    async fn execute(&self, sql: &str) -> StoreResult<u64> {
        let client = self.client().await?;
        client
            .execute(sql, &[])
            .await
            .map_err(|e| StoreError::Internal(format!("postgres execute failed: {e} ({sql})")))
    }

    async fn query(&self, sql: &str) -> StoreResult<Vec<Row>> {
        let client = self.client().await?;
        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| StoreError::Internal(format!("postgres query failed: {e} ({sql})")))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut map = Map::new();
            for (idx, col) in row.columns().iter().enumerate() {
                map.insert(col.name().to_uppercase(), column_value(row, idx, col.type_()));
            }
            out.push(map);
        }
        Ok(out)
    }

    async fn table_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        if let Some(cached) = self.column_cache.get(table) {
            return Ok(cached);
        }
        let client = self.client().await?;
        let columns = schema::table_columns(&client, table).await?;
        self.column_cache.put(table, columns.clone());
        Ok(columns)
    }

    fn format_blob_literal(&self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("decode('{hex}', 'hex')")
    }

    async fn clear_all(&self, resource_types: &[String]) -> StoreResult<()> {
        let client = self.client().await?;
        for resource_type in resource_types {
            let table = naming::table_name(resource_type);
            let _ = client.execute(&format!("TRUNCATE TABLE {table} CASCADE"), &[]).await;
        }
        client
            .execute("TRUNCATE TABLE \"REFERENCES\" CASCADE", &[])
            .await
            .map_err(|e| StoreError::Internal(format!("failed to clear REFERENCES: {e}")))?;
        client
            .execute("TRUNCATE TABLE RESOURCE_HISTORY CASCADE", &[])
            .await
            .map_err(|e| StoreError::Internal(format!("failed to clear RESOURCE_HISTORY: {e}")))?;
        client
            .execute("TRUNCATE TABLE CUSTOM_EXTENSION_SEARCH_PARAMS CASCADE", &[])
            .await
            .map_err(|e| StoreError::Internal(format!("failed to clear CUSTOM_EXTENSION_SEARCH_PARAMS: {e}")))?;
        client
            .execute("DELETE FROM SEARCH_PARAM_RES_EXPRESSIONS WHERE IS_CUSTOM = TRUE", &[])
            .await
            .map_err(|e| StoreError::Internal(format!("failed to clear custom catalog rows: {e}")))?;
        Ok(())
    }
}

fn column_value(row: &tokio_postgres::Row, idx: usize, ty: &PgType) -> Value {
    match *ty {
        PgType::BOOL => row.get::<_, Option<bool>>(idx).map(Value::Bool).unwrap_or(Value::Null),
        PgType::INT2 => row
            .get::<_, Option<i16>>(idx)
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),
        PgType::INT4 => row
            .get::<_, Option<i32>>(idx)
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),
        PgType::INT8 => row
            .get::<_, Option<i64>>(idx)
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),
        PgType::FLOAT4 => row
            .get::<_, Option<f32>>(idx)
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PgType::FLOAT8 => row
            .get::<_, Option<f64>>(idx)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PgType::TIMESTAMPTZ => row
            .get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        PgType::BYTEA => row
            .get::<_, Option<Vec<u8>>>(idx)
            .map(|bytes| Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()))
            .unwrap_or(Value::Null),
        _ => row
            .get::<_, Option<String>>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_defaults() {
        let config = PostgresBackendConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_connections, 10);
    }
}
