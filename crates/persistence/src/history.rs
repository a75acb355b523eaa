//! The append-only version-history log (C6).
//!
//! `RESOURCE_HISTORY` keeps a full snapshot of every version of every
//! resource: a create, update, patch, or delete all append a new row
//! rather than overwrite an existing one. Version numbers are assigned by
//! reading the current maximum and adding one, under the same row lock the
//! resource table write uses, so the two stay in step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backends::Backend;
use crate::error::StoreResult;
use crate::naming::{self, SqlValue};
use crate::types::StoredResource;

/// The operation that produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOperation {
    /// The resource was created.
    Create,
    /// The resource was replaced via `PUT`.
    Update,
    /// The resource was modified via `PATCH`.
    Patch,
    /// The resource was deleted; `snapshot` holds its last live state.
    Delete,
}

impl HistoryOperation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// The HTTP method a Bundle history entry's `request.method` should
    /// report for this operation.
    pub fn http_method(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "CREATE" => Self::Create,
            "UPDATE" => Self::Update,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            other => panic!("unknown history operation in storage: {other}"),
        }
    }
}

/// One row of `RESOURCE_HISTORY`.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Resource type.
    pub resource_type: String,
    /// Logical id.
    pub id: String,
    /// Version number this entry represents.
    pub version_id: u64,
    /// Operation that produced this version.
    pub operation: HistoryOperation,
    /// Canonical resource JSON as it stood after this operation (for
    /// deletes, the resource's state immediately before deletion).
    pub snapshot: Value,
    /// When this version was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// A version pulled from [`RESOURCE_HISTORY`], with the operation that
/// produced it alongside the resource snapshot — [`StoredResource`] itself
/// carries no operation, since a live resource table row has no notion of
/// "how it got there".
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    /// The resource snapshot as of this version.
    pub resource: StoredResource,
    /// The operation that produced this version.
    pub operation: HistoryOperation,
}

const TABLE: &str = "RESOURCE_HISTORY";

fn lit(value: &str) -> String {
    naming::format_literal(&SqlValue::Text(value.to_string()), |_| unreachable!())
        .expect("text literal never fails formatting")
}

fn ts_lit(ts: DateTime<Utc>) -> String {
    naming::format_literal(&SqlValue::Timestamp(ts), |_| unreachable!())
        .expect("timestamp literal never fails formatting")
}

/// The version-history log.
pub struct HistoryStore {
    backend: Arc<dyn Backend>,
}

impl HistoryStore {
    /// Wraps a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The current highest version number for `(resource_type, id)`, or 0
    /// if no version has ever been recorded.
    pub async fn current_version(&self, resource_type: &str, id: &str) -> StoreResult<u64> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT MAX(VERSION_ID) AS V FROM {TABLE} WHERE RESOURCE_TYPE = {} AND RESOURCE_ID = {}",
                lit(resource_type),
                lit(id)
            ))
            .await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("V"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    /// Appends a new version row, assigning it `version_id`.
    pub async fn append(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
        operation: HistoryOperation,
        snapshot: &Value,
    ) -> StoreResult<()> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {TABLE} (RESOURCE_TYPE, RESOURCE_ID, VERSION_ID, OPERATION, SNAPSHOT, RECORDED_AT) \
             VALUES ({}, {}, {}, {}, {}, {})",
            lit(resource_type),
            lit(id),
            version_id,
            lit(operation.as_str()),
            lit(&snapshot.to_string()),
            ts_lit(now),
        );
        self.backend.execute(&sql).await?;
        Ok(())
    }

    /// Removes a version row — used only by create/update rollback to undo
    /// an `append` that was never committed to the live resource table.
    pub async fn remove(&self, resource_type: &str, id: &str, version_id: u64) -> StoreResult<()> {
        self.backend
            .execute(&format!(
                "DELETE FROM {TABLE} WHERE RESOURCE_TYPE = {} AND RESOURCE_ID = {} AND VERSION_ID = {}",
                lit(resource_type),
                lit(id),
                version_id
            ))
            .await?;
        Ok(())
    }

    /// One specific version, or `None` if it was never recorded.
    pub async fn by_version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
    ) -> StoreResult<Option<HistoryRecord>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT * FROM {TABLE} WHERE RESOURCE_TYPE = {} AND RESOURCE_ID = {} AND VERSION_ID = {}",
                lit(resource_type),
                lit(id),
                version_id
            ))
            .await?;
        Ok(rows.first().and_then(row_to_entry).map(entry_to_record))
    }

    /// Every version of `(resource_type, id)`, newest first.
    pub async fn all_versions(&self, resource_type: &str, id: &str) -> StoreResult<Vec<HistoryRecord>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT * FROM {TABLE} WHERE RESOURCE_TYPE = {} AND RESOURCE_ID = {} \
                 ORDER BY VERSION_ID DESC",
                lit(resource_type),
                lit(id)
            ))
            .await?;
        Ok(rows.iter().filter_map(row_to_entry).map(entry_to_record).collect())
    }

    /// Every version of every resource of `resource_type`, newest first
    /// within each id, used by type-level history (`GET /{type}/_history`).
    pub async fn all_versions_for_type(&self, resource_type: &str) -> StoreResult<Vec<HistoryRecord>> {
        let rows = self
            .backend
            .query(&format!(
                "SELECT * FROM {TABLE} WHERE RESOURCE_TYPE = {} ORDER BY RECORDED_AT DESC",
                lit(resource_type)
            ))
            .await?;
        Ok(rows.iter().filter_map(row_to_entry).map(entry_to_record).collect())
    }
}

fn entry_to_record(entry: HistoryEntry) -> HistoryRecord {
    let operation = entry.operation;
    let resource = StoredResource::new(
        entry.resource_type,
        entry.id,
        entry.version_id,
        entry.recorded_at,
        entry.recorded_at,
        entry.snapshot,
    );
    HistoryRecord { resource, operation }
}

fn row_to_entry(row: &crate::backends::Row) -> Option<HistoryEntry> {
    let snapshot_text = row.get("SNAPSHOT")?.as_str()?;
    let snapshot: Value = serde_json::from_str(snapshot_text).ok()?;
    Some(HistoryEntry {
        resource_type: row.get("RESOURCE_TYPE")?.as_str()?.to_string(),
        id: row.get("RESOURCE_ID")?.as_str()?.to_string(),
        version_id: row.get("VERSION_ID")?.as_u64()?,
        operation: HistoryOperation::parse(row.get("OPERATION")?.as_str()?),
        snapshot,
        recorded_at: parse_ts(row.get("RECORDED_AT")),
    })
}

fn parse_ts(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
