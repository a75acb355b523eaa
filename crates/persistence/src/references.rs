//! The reference graph store (C3).
//!
//! FHIR references are polymorphic (`Appointment.participant.actor` may
//! point to `Patient`, `Practitioner`, `Group`, …). Rather than per-pair
//! foreign keys, every reference embedded in a resource becomes an edge row
//! `(sourceType, sourceId, sourceExpression, targetType, targetId,
//! displayValue)` in a single table. Reference-based search, `_include`,
//! `_revinclude`, and cascading behaviours are all queries against this one
//! relation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backends::Backend;
use crate::error::StoreResult;
use crate::naming::{self, SqlValue};

/// A reference edge as stored in `REFERENCES`.
#[derive(Debug, Clone)]
pub struct ReferenceEdge {
    /// Primary key.
    pub id: i64,
    /// Resource type owning the reference field.
    pub source_type: String,
    /// Id of the resource owning the reference field.
    pub source_id: String,
    /// Leaf JSON field name the reference was found in (e.g. `actor`).
    pub source_expression: String,
    /// Resource type the reference points at.
    pub target_type: String,
    /// Id of the resource the reference points at.
    pub target_id: String,
    /// `display` text carried alongside the reference, if any.
    pub display_value: Option<String>,
    /// When the edge was first created.
    pub created_at: DateTime<Utc>,
    /// When the edge was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the edge was last touched (mirrors `updated_at`; kept distinct
    /// to match the schema's column set).
    pub last_updated: DateTime<Utc>,
}

/// A not-yet-persisted edge, as produced by the extractor (C5).
#[derive(Debug, Clone)]
pub struct NewEdge {
    /// Resource type owning the reference field.
    pub source_type: String,
    /// Id of the resource owning the reference field.
    pub source_id: String,
    /// Leaf JSON field name the reference was found in.
    pub source_expression: String,
    /// Resource type the reference points at.
    pub target_type: String,
    /// Id of the resource the reference points at.
    pub target_id: String,
    /// `display` text, if any.
    pub display_value: Option<String>,
}

const TABLE: &str = "\"REFERENCES\"";

fn lit(value: &str) -> String {
    naming::format_literal(&SqlValue::Text(value.to_string()), |_| unreachable!())
        .expect("text literal never fails formatting")
}

fn opt_lit(value: Option<&str>) -> String {
    match value {
        Some(v) => lit(v),
        None => "NULL".to_string(),
    }
}

fn ts_lit(ts: DateTime<Utc>) -> String {
    naming::format_literal(&SqlValue::Timestamp(ts), |_| unreachable!())
        .expect("timestamp literal never fails formatting")
}

/// The reference graph store.
pub struct ReferenceStore {
    backend: Arc<dyn Backend>,
}

impl ReferenceStore {
    /// Wraps a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Appends a new edge and returns its assigned primary key.
    pub async fn insert_edge(&self, edge: &NewEdge) -> StoreResult<i64> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {TABLE} (SOURCE_RESOURCE_TYPE, SOURCE_RESOURCE_ID, SOURCE_EXPRESSION, \
             TARGET_RESOURCE_TYPE, TARGET_RESOURCE_ID, DISPLAY_VALUE, CREATED_AT, UPDATED_AT, LAST_UPDATED) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {})",
            lit(&edge.source_type),
            lit(&edge.source_id),
            lit(&edge.source_expression),
            lit(&edge.target_type),
            lit(&edge.target_id),
            opt_lit(edge.display_value.as_deref()),
            ts_lit(now),
            ts_lit(now),
            ts_lit(now),
        );
        self.backend.execute(&sql).await?;
        let rows = self
            .backend
            .query(&format!("SELECT MAX(ID) AS ID FROM {TABLE}"))
            .await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("ID"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Re-inserts an edge preserving its original primary key — used by
    /// delete rollback to rematerialise edges exactly as they were.
    pub async fn restore_edge(&self, edge: &ReferenceEdge) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {TABLE} (ID, SOURCE_RESOURCE_TYPE, SOURCE_RESOURCE_ID, SOURCE_EXPRESSION, \
             TARGET_RESOURCE_TYPE, TARGET_RESOURCE_ID, DISPLAY_VALUE, CREATED_AT, UPDATED_AT, LAST_UPDATED) \
             VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {})",
            edge.id,
            lit(&edge.source_type),
            lit(&edge.source_id),
            lit(&edge.source_expression),
            lit(&edge.target_type),
            lit(&edge.target_id),
            opt_lit(edge.display_value.as_deref()),
            ts_lit(edge.created_at),
            ts_lit(edge.updated_at),
            ts_lit(edge.last_updated),
        );
        self.backend.execute(&sql).await?;
        Ok(())
    }

    /// Deletes a single edge by primary key.
    pub async fn delete_edge_by_id(&self, id: i64) -> StoreResult<()> {
        self.backend
            .execute(&format!("DELETE FROM {TABLE} WHERE ID = {id}"))
            .await?;
        Ok(())
    }

    /// Deletes every outgoing edge from `(source_type, source_id)`.
    pub async fn delete_edges_by_source(&self, source_type: &str, source_id: &str) -> StoreResult<()> {
        self.backend
            .execute(&format!(
                "DELETE FROM {TABLE} WHERE SOURCE_RESOURCE_TYPE = {} AND SOURCE_RESOURCE_ID = {}",
                lit(source_type),
                lit(source_id)
            ))
            .await?;
        Ok(())
    }

    /// Every edge id outgoing from `(source_type, source_id)`.
    pub async fn edge_ids_by_source(&self, source_type: &str, source_id: &str) -> StoreResult<Vec<i64>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT ID FROM {TABLE} WHERE SOURCE_RESOURCE_TYPE = {} AND SOURCE_RESOURCE_ID = {}",
                lit(source_type),
                lit(source_id)
            ))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get("ID").and_then(Value::as_i64))
            .collect())
    }

    /// Every edge row outgoing from `(source_type, source_id)` — used to
    /// snapshot edges for delete rollback.
    pub async fn edges_by_source(&self, source_type: &str, source_id: &str) -> StoreResult<Vec<ReferenceEdge>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT * FROM {TABLE} WHERE SOURCE_RESOURCE_TYPE = {} AND SOURCE_RESOURCE_ID = {}",
                lit(source_type),
                lit(source_id)
            ))
            .await?;
        Ok(rows.iter().filter_map(row_to_edge).collect())
    }

    /// Distinct `(sourceType, sourceId)` pairs pointing at `(target_type,
    /// target_id)`, optionally constrained to one source type and/or one
    /// `sourceExpression`.
    ///
    /// A plain reference-based search (the common case) does **not** filter
    /// by `sourceExpression` — only `_include`/`_revinclude` supply the
    /// expected leaf field, because a search like `?patient=Patient/123`
    /// should match regardless of which reference field on the resource
    /// pointed at the patient.
    pub async fn distinct_sources(
        &self,
        target_type: &str,
        target_id: &str,
        source_type_filter: Option<&str>,
        source_expression: Option<&str>,
    ) -> StoreResult<Vec<(String, String)>> {
        let mut sql = format!(
            "SELECT DISTINCT SOURCE_RESOURCE_TYPE, SOURCE_RESOURCE_ID FROM {TABLE} \
             WHERE TARGET_RESOURCE_TYPE = {} AND TARGET_RESOURCE_ID = {}",
            lit(target_type),
            lit(target_id)
        );
        if let Some(st) = source_type_filter {
            sql.push_str(&format!(" AND SOURCE_RESOURCE_TYPE = {}", lit(st)));
        }
        if let Some(expr) = source_expression {
            sql.push_str(&format!(" AND SOURCE_EXPRESSION = {}", lit(expr)));
        }
        let rows = self.backend.query(&sql).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                let t = r.get("SOURCE_RESOURCE_TYPE")?.as_str()?.to_string();
                let i = r.get("SOURCE_RESOURCE_ID")?.as_str()?.to_string();
                Some((t, i))
            })
            .collect())
    }

    /// Distinct `(targetType, targetId)` pairs reachable from
    /// `(source_type, source_id)`, optionally constrained to one
    /// `sourceExpression` (used by `_include`) or left unconstrained (used
    /// by the `_include=*` wildcard).
    pub async fn distinct_targets(
        &self,
        source_type: &str,
        source_id: &str,
        source_expression: Option<&str>,
        target_type_filter: Option<&str>,
    ) -> StoreResult<Vec<(String, String)>> {
        let mut sql = format!(
            "SELECT DISTINCT TARGET_RESOURCE_TYPE, TARGET_RESOURCE_ID FROM {TABLE} \
             WHERE SOURCE_RESOURCE_TYPE = {} AND SOURCE_RESOURCE_ID = {}",
            lit(source_type),
            lit(source_id)
        );
        if let Some(expr) = source_expression {
            sql.push_str(&format!(" AND SOURCE_EXPRESSION = {}", lit(expr)));
        }
        if let Some(tt) = target_type_filter {
            sql.push_str(&format!(" AND TARGET_RESOURCE_TYPE = {}", lit(tt)));
        }
        let rows = self.backend.query(&sql).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                let t = r.get("TARGET_RESOURCE_TYPE")?.as_str()?.to_string();
                let i = r.get("TARGET_RESOURCE_ID")?.as_str()?.to_string();
                Some((t, i))
            })
            .collect())
    }
}

fn row_to_edge(row: &crate::backends::Row) -> Option<ReferenceEdge> {
    Some(ReferenceEdge {
        id: row.get("ID")?.as_i64()?,
        source_type: row.get("SOURCE_RESOURCE_TYPE")?.as_str()?.to_string(),
        source_id: row.get("SOURCE_RESOURCE_ID")?.as_str()?.to_string(),
        source_expression: row.get("SOURCE_EXPRESSION")?.as_str()?.to_string(),
        target_type: row.get("TARGET_RESOURCE_TYPE")?.as_str()?.to_string(),
        target_id: row.get("TARGET_RESOURCE_ID")?.as_str()?.to_string(),
        display_value: row
            .get("DISPLAY_VALUE")
            .and_then(Value::as_str)
            .map(str::to_string),
        created_at: parse_ts(row.get("CREATED_AT")),
        updated_at: parse_ts(row.get("UPDATED_AT")),
        last_updated: parse_ts(row.get("LAST_UPDATED")),
    })
}

fn parse_ts(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
