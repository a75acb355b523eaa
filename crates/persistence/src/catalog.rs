//! The search-parameter catalog (C4).
//!
//! `SEARCH_PARAM_RES_EXPRESSIONS` is the in-database table of
//! `(searchParamName, searchParamType, resourceName, expression, isCustom)`
//! rows. Standard rows are bulk-loaded once from [`SEED_CSV`], the bundled
//! CSV shipped with the binary; custom rows come and go as `SearchParameter`
//! resources are created, updated, and deleted.

use std::sync::Arc;

use serde_json::Value;

use crate::backends::Backend;
use crate::error::{StoreError, StoreResult};
use crate::naming::{self, SqlValue};
use crate::types::SearchParamType;

/// The standard search-parameter CSV bundled with the binary.
pub const SEED_CSV: &str = include_str!("../data/search_parameters.csv");

const TABLE: &str = "SEARCH_PARAM_RES_EXPRESSIONS";

/// One catalog row.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Search-parameter name (e.g. `name`, `patient`).
    pub name: String,
    /// Declared type.
    pub param_type: SearchParamType,
    /// Resource type this row applies to.
    pub resource_type: String,
    /// FHIRPath expression (or the specially-parsed `.where(...)` shapes).
    pub expression: String,
    /// `true` for rows created from a `SearchParameter` resource.
    pub is_custom: bool,
}

/// Parses [`SEED_CSV`] into catalog entries, all marked non-custom.
pub fn parse_seed(csv_text: &str) -> StoreResult<Vec<CatalogEntry>> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StoreError::Internal(format!("bad catalog CSV: {e}")))?;
        let name = record.get(0).unwrap_or_default().to_string();
        let resource_type = record.get(1).unwrap_or_default().to_string();
        let raw_type = record.get(2).unwrap_or_default();
        let expression = record.get(3).unwrap_or_default().to_string();
        let param_type = SearchParamType::parse(raw_type).ok_or_else(|| {
            StoreError::Internal(format!("unknown search parameter type in seed CSV: {raw_type}"))
        })?;
        entries.push(CatalogEntry {
            name,
            param_type,
            resource_type,
            expression,
            is_custom: false,
        });
    }
    Ok(entries)
}

fn lit(value: &str) -> String {
    naming::format_literal(&SqlValue::Text(value.to_string()), |_| unreachable!())
        .expect("text literal never fails formatting")
}

/// The search-parameter catalog.
pub struct Catalog {
    backend: Arc<dyn Backend>,
}

impl Catalog {
    /// Wraps a backend. Call [`Catalog::ensure_seeded`] once during
    /// startup after `backend.bootstrap()`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Loads the bundled CSV and inserts every row, unless the catalog
    /// table already has standard rows (first-time schema init only).
    pub async fn ensure_seeded(&self) -> StoreResult<()> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT COUNT(*) AS N FROM {TABLE} WHERE IS_CUSTOM = FALSE"
            ))
            .await?;
        let already_seeded = rows
            .first()
            .and_then(|r| r.get("N"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
            > 0;
        if already_seeded {
            return Ok(());
        }
        for entry in parse_seed(SEED_CSV)? {
            self.insert_row(&entry).await?;
        }
        Ok(())
    }

    async fn insert_row(&self, entry: &CatalogEntry) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {TABLE} (SEARCH_PARAM_NAME, SEARCH_PARAM_TYPE, RESOURCE_NAME, EXPRESSION, IS_CUSTOM) \
             VALUES ({}, {}, {}, {}, {})",
            lit(&entry.name),
            lit(entry.param_type.as_str()),
            lit(&entry.resource_type),
            lit(&entry.expression),
            if entry.is_custom { "TRUE" } else { "FALSE" },
        );
        self.backend.execute(&sql).await?;
        Ok(())
    }

    /// Every catalog row for `resource_type` — read fresh on every write,
    /// never cached, since custom rows can change between writes.
    pub async fn params_for_type(&self, resource_type: &str) -> StoreResult<Vec<CatalogEntry>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT SEARCH_PARAM_NAME, SEARCH_PARAM_TYPE, RESOURCE_NAME, EXPRESSION, IS_CUSTOM \
                 FROM {TABLE} WHERE RESOURCE_NAME = {}",
                lit(resource_type)
            ))
            .await?;
        Ok(rows.iter().filter_map(row_to_entry).collect())
    }

    /// Every distinct `resourceName` the catalog declares search parameters
    /// for — the resource-type catalog a `CapabilityStatement` or a
    /// startup `clearDataOnStartup` sweep needs.
    pub async fn distinct_resource_types(&self) -> StoreResult<Vec<String>> {
        let rows = self
            .backend
            .query(&format!("SELECT DISTINCT RESOURCE_NAME FROM {TABLE} ORDER BY RESOURCE_NAME"))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get("RESOURCE_NAME").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    /// One catalog row by `(resource_type, name)`, standard or custom.
    pub async fn find(&self, resource_type: &str, name: &str) -> StoreResult<Option<CatalogEntry>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT SEARCH_PARAM_NAME, SEARCH_PARAM_TYPE, RESOURCE_NAME, EXPRESSION, IS_CUSTOM \
                 FROM {TABLE} WHERE RESOURCE_NAME = {} AND SEARCH_PARAM_NAME = {}",
                lit(resource_type),
                lit(name)
            ))
            .await?;
        Ok(rows.iter().find_map(row_to_entry))
    }

    /// Upserts custom catalog rows from a `SearchParameter` resource: one
    /// row per entry in its `base` array.
    pub async fn upsert_custom(
        &self,
        code: &str,
        param_type: SearchParamType,
        expression: &str,
        bases: &[String],
    ) -> StoreResult<()> {
        naming::validate_identifier(code)?;
        for base in bases {
            naming::validate_identifier(base)?;
        }
        for base in bases {
            self.backend
                .execute(&format!(
                    "DELETE FROM {TABLE} WHERE RESOURCE_NAME = {} AND SEARCH_PARAM_NAME = {} AND IS_CUSTOM = TRUE",
                    lit(base),
                    lit(code)
                ))
                .await?;
            self.insert_row(&CatalogEntry {
                name: code.to_string(),
                param_type,
                resource_type: base.clone(),
                expression: expression.to_string(),
                is_custom: true,
            })
            .await?;
        }
        Ok(())
    }

    /// Removes every custom catalog row for `code` across `bases` — used
    /// when a `SearchParameter` resource is deleted.
    pub async fn delete_custom(&self, code: &str, bases: &[String]) -> StoreResult<()> {
        for base in bases {
            self.backend
                .execute(&format!(
                    "DELETE FROM {TABLE} WHERE RESOURCE_NAME = {} AND SEARCH_PARAM_NAME = {} AND IS_CUSTOM = TRUE",
                    lit(base),
                    lit(code)
                ))
                .await?;
        }
        Ok(())
    }
}

fn row_to_entry(row: &crate::backends::Row) -> Option<CatalogEntry> {
    Some(CatalogEntry {
        name: row.get("SEARCH_PARAM_NAME")?.as_str()?.to_string(),
        param_type: SearchParamType::parse(row.get("SEARCH_PARAM_TYPE")?.as_str()?)?,
        resource_type: row.get("RESOURCE_NAME")?.as_str()?.to_string(),
        expression: row.get("EXPRESSION")?.as_str()?.to_string(),
        is_custom: row
            .get("IS_CUSTOM")
            .map(truthy)
            .unwrap_or(false),
    })
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
        _ => false,
    }
}
