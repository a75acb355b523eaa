//! Create/update/patch/delete/read/search engines (C8, C9).
//!
//! Everything in [`catalog`](crate::catalog), [`extractor`](crate::extractor),
//! [`history`](crate::history), [`references`](crate::references), and
//! [`transaction`](crate::transaction) is orchestrated here into the six
//! operations a caller actually issues against a [`Store`]. Each write
//! operation follows the same shape: extract, validate, mutate, and on any
//! failure past the point of mutation, drive the matching rollback protocol
//! from [`transaction`](crate::transaction).

mod bundle;
mod create;
mod delete;
mod patch;
mod read;
mod search;
mod update;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backends::{Backend, Row};
use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{StoreError, StoreResult};
use crate::extractor::{CustomParamValue, ExtractionResult};
use crate::history::HistoryStore;
use crate::naming::{self, SqlValue};
use crate::references::{NewEdge, ReferenceStore};
use crate::types::{SearchParamType, StoredResource};

pub use bundle::{Bundle, BundleEntry, SearchMode};
pub use patch::PatchInput;

/// Tunables for a [`Store`], covering the parts of the configuration surface
/// that affect the storage engine rather than the HTTP layer.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// When `true`, the server assigns ids on create (`POST`) and rejects a
    /// client-supplied `id`; when `false`, the client must supply one.
    pub server_generated_ids: bool,
    /// Default search page size when `_count` is absent.
    pub default_page_size: usize,
    /// Upper bound a client's `_count` is clamped to.
    pub max_page_size: usize,
    /// Base URL used to build each bundle entry's `fullUrl`.
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            server_generated_ids: true,
            default_page_size: 20,
            max_page_size: 100,
            base_url: "http://localhost:8080/fhir/r4".to_string(),
        }
    }
}

/// The storage and search engine: every CRUD and search operation a caller
/// issues flows through here.
pub struct Store {
    backend: Arc<dyn Backend>,
    catalog: Catalog,
    references: ReferenceStore,
    history: HistoryStore,
    config: StoreConfig,
}

impl Store {
    /// Wraps a backend with the given configuration.
    pub fn new(backend: Arc<dyn Backend>, config: StoreConfig) -> Self {
        let catalog = Catalog::new(backend.clone());
        let references = ReferenceStore::new(backend.clone());
        let history = HistoryStore::new(backend.clone());
        Self {
            backend,
            catalog,
            references,
            history,
            config,
        }
    }

    /// Runs schema bootstrap and seeds the standard search-parameter
    /// catalog. Call once at startup, before serving requests.
    pub async fn bootstrap(&self) -> StoreResult<()> {
        self.backend.bootstrap().await?;
        self.catalog.ensure_seeded().await
    }

    /// Mass-clears every resource and index table, used when
    /// `clearDataOnStartup` is configured.
    pub async fn clear_all(&self, resource_types: &[String]) -> StoreResult<()> {
        self.backend.clear_all(resource_types).await
    }

    /// Every resource type the search-parameter catalog knows about —
    /// the set `GET /metadata` advertises interactions for, and the
    /// default resource-type list `clearDataOnStartup` sweeps.
    pub async fn known_resource_types(&self) -> StoreResult<Vec<String>> {
        self.catalog.distinct_resource_types().await
    }

    /// `POST /{Type}`.
    pub async fn create(&self, resource_type: &str, body: Value) -> StoreResult<StoredResource> {
        naming::validate_identifier(resource_type)?;
        create::create(self, resource_type, body).await
    }

    /// `GET /{Type}/{id}`.
    pub async fn read(&self, resource_type: &str, id: &str) -> StoreResult<StoredResource> {
        naming::validate_identifier(resource_type)?;
        read::read(self, resource_type, id).await
    }

    /// `GET /{Type}/{id}/_history/{vid}`.
    pub async fn vread(&self, resource_type: &str, id: &str, version_id: u64) -> StoreResult<StoredResource> {
        naming::validate_identifier(resource_type)?;
        read::vread(self, resource_type, id, version_id).await
    }

    /// `GET /{Type}/{id}/_history`.
    pub async fn history_instance(&self, resource_type: &str, id: &str) -> StoreResult<Vec<crate::history::HistoryRecord>> {
        naming::validate_identifier(resource_type)?;
        read::history_instance(self, resource_type, id).await
    }

    /// `PUT /{Type}/{id}` — full replace, no upsert.
    pub async fn update(&self, resource_type: &str, id: &str, body: Value) -> StoreResult<StoredResource> {
        naming::validate_identifier(resource_type)?;
        update::update(self, resource_type, id, body).await
    }

    /// `PATCH /{Type}/{id}`.
    pub async fn patch(&self, resource_type: &str, id: &str, input: PatchInput) -> StoreResult<StoredResource> {
        naming::validate_identifier(resource_type)?;
        patch::patch(self, resource_type, id, input).await
    }

    /// `DELETE /{Type}/{id}`.
    pub async fn delete(&self, resource_type: &str, id: &str) -> StoreResult<()> {
        naming::validate_identifier(resource_type)?;
        delete::delete(self, resource_type, id).await
    }

    /// `GET /{Type}?…`. `raw_params` are the already-decoded query string
    /// pairs (including leading-underscore control parameters); `page` is
    /// the zero-based page index, computed by the caller.
    pub async fn search(
        &self,
        resource_type: &str,
        raw_params: &[(String, String)],
        page: usize,
    ) -> StoreResult<Bundle> {
        naming::validate_identifier(resource_type)?;
        search::search(self, resource_type, raw_params, page).await
    }

    /// The configuration this store was built with, for callers (the HTTP
    /// layer) that need `base_url` or the page-size bounds.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Formats a text value as a SQL literal. Never fails: [`SqlValue::Text`]
/// formatting only fails for non-finite decimals, which this never builds.
fn lit(value: &str) -> String {
    naming::format_literal(&SqlValue::Text(value.to_string()), |_| unreachable!())
        .expect("text literal never fails formatting")
}

impl Store {
    /// Fetches the live row for `(resource_type, id)`, or `None` if the
    /// resource's table doesn't exist yet or has no matching row.
    async fn fetch_row(&self, resource_type: &str, id: &str) -> StoreResult<Option<Row>> {
        let table = naming::table_name(resource_type);
        let columns = self.backend.table_columns(&table).await?;
        if columns.is_empty() {
            return Ok(None);
        }
        let pk = naming::primary_key(resource_type);
        let sql = format!("SELECT * FROM {table} WHERE {pk} = {}", lit(id));
        let rows = self.backend.query(&sql).await?;
        Ok(rows.into_iter().next())
    }

    /// Returns [`StoreError::InvalidReference`] for the first edge whose
    /// target has no live row (invariant I3).
    async fn assert_references_exist(&self, edges: &[NewEdge]) -> StoreResult<()> {
        for edge in edges {
            if self.fetch_row(&edge.target_type, &edge.target_id).await?.is_none() {
                return Err(StoreError::InvalidReference {
                    reference: format!("{}/{}", edge.target_type, edge.target_id),
                });
            }
        }
        Ok(())
    }
}

/// Builds a [`Store`]'s id for a newly created resource per
/// `config.server_generated_ids`.
fn resolve_id(store: &Store, body: &Value) -> StoreResult<String> {
    if store.config.server_generated_ids {
        Ok(uuid::Uuid::new_v4().simple().to_string())
    } else {
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                StoreError::InvalidInput(
                    "client-supplied id is required when server-generated ids are disabled".to_string(),
                )
            })
    }
}

/// Rejects a body whose `resourceType` doesn't match the path segment.
fn validate_resource_type(body: &Value, resource_type: &str) -> StoreResult<()> {
    match body.get("resourceType").and_then(Value::as_str) {
        Some(rt) if rt == resource_type => Ok(()),
        Some(rt) => Err(StoreError::InvalidInput(format!(
            "body resourceType {rt} does not match path type {resource_type}"
        ))),
        None => Err(StoreError::InvalidInput("missing resourceType".to_string())),
    }
}

/// Rejects a body whose `id` doesn't match the path id, when the body
/// supplies one at all.
fn validate_id_match(body: &Value, id: &str) -> StoreResult<()> {
    match body.get("id").and_then(Value::as_str) {
        Some(body_id) if body_id == id => Ok(()),
        Some(body_id) => Err(StoreError::InvalidInput(format!(
            "body id {body_id} does not match path id {id}"
        ))),
        None => Ok(()),
    }
}

/// Converts a resource table row into a [`StoredResource`].
fn row_to_resource(resource_type: &str, row: &Row) -> StoreResult<StoredResource> {
    let pk = naming::primary_key(resource_type);
    let id = row
        .get(&pk)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Internal(format!("{pk} missing from {resource_type} row")))?
        .to_string();
    let version_id = row.get("VERSION_ID").and_then(Value::as_u64).unwrap_or(0);
    let created_at = parse_row_timestamp(row.get("CREATED_AT"));
    let last_updated = parse_row_timestamp(row.get("LAST_UPDATED"));
    let content_text = row
        .get("CONTENT")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Internal(format!("CONTENT missing from {resource_type} row")))?;
    let content: Value = serde_json::from_str(content_text)?;
    Ok(StoredResource::new(resource_type, id, version_id, created_at, last_updated, content))
}

/// Parses a timestamp column value, accepting both the literal format
/// [`naming::format_literal`] writes (`YYYY-MM-DD HH:MM:SS.mmm`) and the
/// RFC 3339 form PostgreSQL's driver returns.
fn parse_row_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    let text = match value.and_then(Value::as_str) {
        Some(s) => s,
        None => return Utc::now(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return DateTime::from_naive_utc_and_offset(naive, Utc);
    }
    Utc::now()
}

/// Computes, for every standard (non-custom) catalog entry, the column
/// assignments a write should make: the extracted value's columns if the
/// extractor produced one, or `NULL` across that parameter's columns
/// otherwise (clearing a value a prior version had that the new one lacks).
fn standard_column_assignments(
    catalog_entries: &[CatalogEntry],
    extraction: &ExtractionResult,
) -> Vec<(String, SqlValue)> {
    let mut assignments = Vec::new();
    for entry in catalog_entries.iter().filter(|e| !e.is_custom) {
        let specs = naming::column_specs(&entry.name, entry.param_type);
        if specs.is_empty() {
            continue; // reference parameters: no column, only edges.
        }
        match extraction.columns.iter().find(|(name, _)| name == &entry.name) {
            Some((_, value)) => assignments.extend(naming::column_values(&entry.name, value)),
            None => assignments.extend(specs.into_iter().map(|(column, _)| (column, SqlValue::Null))),
        }
    }
    assignments
}

/// The EAV value columns one [`CustomParamValue`] occupies.
fn custom_value_assignments(value: &crate::types::IndexValue) -> Vec<(&'static str, SqlValue)> {
    use crate::types::IndexValue;
    match value {
        IndexValue::Text(s) => vec![("VALUE_TEXT", SqlValue::Text(s.clone()))],
        IndexValue::Number(n) => vec![("VALUE_NUMBER", SqlValue::Decimal(*n))],
        IndexValue::Date(s) => vec![("VALUE_DATE", SqlValue::Text(s.clone()))],
        IndexValue::Token { system, code } => vec![
            ("VALUE_TOKEN_CODE", SqlValue::Text(code.clone())),
            ("VALUE_TOKEN_SYSTEM", system.clone().map(SqlValue::Text).unwrap_or(SqlValue::Null)),
        ],
        IndexValue::Reference { target_type, target_id } => vec![
            ("VALUE_REFERENCE_TYPE", SqlValue::Text(target_type.clone())),
            ("VALUE_REFERENCE_ID", SqlValue::Text(target_id.clone())),
        ],
    }
}

/// Fully rewrites `CUSTOM_EXTENSION_SEARCH_PARAMS` for `(resource_type, id)`:
/// deletes every prior row, then inserts one row per `values` entry.
async fn rewrite_custom_params(
    store: &Store,
    resource_type: &str,
    id: &str,
    values: &[CustomParamValue],
) -> StoreResult<()> {
    store
        .backend
        .execute(&format!(
            "DELETE FROM CUSTOM_EXTENSION_SEARCH_PARAMS WHERE RESOURCE_TYPE = {} AND RESOURCE_ID = {}",
            lit(resource_type),
            lit(id)
        ))
        .await?;

    for entry in values {
        let mut columns = vec!["RESOURCE_TYPE".to_string(), "RESOURCE_ID".to_string(), "PARAM_NAME".to_string()];
        let mut literals = vec![lit(resource_type), lit(id), lit(&entry.name)];
        for (column, value) in custom_value_assignments(&entry.value) {
            columns.push(column.to_string());
            literals.push(naming::format_literal(&value, |b| store.backend.format_blob_literal(b))?);
        }
        let sql = format!(
            "INSERT INTO CUSTOM_EXTENSION_SEARCH_PARAMS ({}) VALUES ({})",
            columns.join(", "),
            literals.join(", ")
        );
        store.backend.execute(&sql).await?;
    }
    Ok(())
}

/// Upserts catalog rows for a newly created/updated `SearchParameter` body
/// (C4's custom seed path).
async fn sync_search_parameter_catalog(store: &Store, body: &Value) -> StoreResult<()> {
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidInput("SearchParameter.code is required".to_string()))?;
    let raw_type = body
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidInput("SearchParameter.type is required".to_string()))?;
    let param_type = SearchParamType::parse(raw_type)
        .ok_or_else(|| StoreError::InvalidInput(format!("unsupported search parameter type: {raw_type}")))?;
    let expression = body
        .get("expression")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidInput("SearchParameter.expression is required".to_string()))?;
    let bases = string_array(body, "base");
    if bases.is_empty() {
        return Err(StoreError::InvalidInput(
            "SearchParameter.base must name at least one resource type".to_string(),
        ));
    }
    store.catalog.upsert_custom(code, param_type, expression, &bases).await
}

/// Removes catalog rows for a deleted `SearchParameter` body.
async fn remove_search_parameter_catalog(store: &Store, body: &Value) -> StoreResult<()> {
    let code = body.get("code").and_then(Value::as_str).unwrap_or_default();
    let bases = string_array(body, "base");
    if code.is_empty() || bases.is_empty() {
        return Ok(());
    }
    store.catalog.delete_custom(code, &bases).await
}

fn string_array(body: &Value, field: &str) -> Vec<String> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Builds the future that rolls a resource table row back to exactly the
/// state captured in `row`, via `UPDATE … SET <every column> WHERE pk = id`.
/// Used by update rollback, where the row still exists and only needs its
/// columns restored.
fn restore_row_update<'a>(store: &'a Store, resource_type: &str, row: &Row) -> impl Future<Output = StoreResult<()>> + 'a {
    let table = naming::table_name(resource_type);
    let pk = naming::primary_key(resource_type);
    let row = row.clone();
    async move {
        let mut sets = Vec::new();
        for (column, value) in row.iter() {
            if column.eq_ignore_ascii_case(&pk) {
                continue;
            }
            let sql_value = naming::json_scalar_to_sql(value);
            let literal = naming::format_literal(&sql_value, |b| store.backend.format_blob_literal(b))?;
            sets.push(format!("{column} = {literal}"));
        }
        let id = row.get(&pk).and_then(Value::as_str).unwrap_or_default();
        let sql = format!("UPDATE {table} SET {} WHERE {pk} = {}", sets.join(", "), lit(id));
        store.backend.execute(&sql).await?;
        Ok(())
    }
}

/// Builds the future that re-materialises a deleted row exactly as `row`
/// captured it, via a dynamic-column `INSERT`. Used by delete rollback,
/// where the row no longer exists at all.
fn restore_row_insert<'a>(store: &'a Store, resource_type: &str, row: &Row) -> impl Future<Output = StoreResult<()>> + 'a {
    let table = naming::table_name(resource_type);
    let row = row.clone();
    async move {
        let mut columns = Vec::with_capacity(row.len());
        let mut literals = Vec::with_capacity(row.len());
        for (column, value) in row.iter() {
            columns.push(column.clone());
            let sql_value = naming::json_scalar_to_sql(value);
            literals.push(naming::format_literal(&sql_value, |b| store.backend.format_blob_literal(b))?);
        }
        let sql = format!("INSERT INTO {table} ({}) VALUES ({})", columns.join(", "), literals.join(", "));
        store.backend.execute(&sql).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_resource_type_rejects_mismatch() {
        let body = json!({"resourceType": "Patient"});
        assert!(validate_resource_type(&body, "Patient").is_ok());
        assert!(validate_resource_type(&body, "Appointment").is_err());
    }

    #[test]
    fn validate_id_match_allows_absent_id() {
        let body = json!({"resourceType": "Patient"});
        assert!(validate_id_match(&body, "abc").is_ok());
    }

    #[test]
    fn validate_id_match_rejects_mismatch() {
        let body = json!({"resourceType": "Patient", "id": "other"});
        assert!(validate_id_match(&body, "abc").is_err());
    }

    #[tokio::test]
    async fn create_rejects_resource_type_with_sql_metacharacters() {
        let backend = Arc::new(crate::backends::sqlite::SqliteBackend::in_memory().unwrap());
        let store = Store::new(backend, StoreConfig::default());
        store.bootstrap().await.unwrap();
        let err = store
            .create("Patient\"; DROP TABLE \"REFERENCES", json!({"resourceType": "Patient"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn resolve_id_requires_client_id_when_disabled() {
        let backend = Arc::new(crate::backends::sqlite::SqliteBackend::in_memory().unwrap());
        let store = Store::new(
            backend,
            StoreConfig { server_generated_ids: false, ..Default::default() },
        );
        assert!(resolve_id(&store, &json!({})).is_err());
        assert!(resolve_id(&store, &json!({"id": "abc"})).is_ok());
    }
}
