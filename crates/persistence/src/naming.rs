//! Deterministic naming and SQL literal formatting (C2).
//!
//! Every function here is pure and thread-safe. This module is the *only*
//! place in the crate that turns a value into a SQL literal fragment — no
//! other component builds SQL text from raw values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::types::{IndexValue, SearchParamType};

/// Rejects a `resource_type` or search-parameter `code` that contains
/// anything outside ASCII letters, digits, `-`, and `_` — the one gate
/// every value reaching [`table_name`], [`primary_key`], or [`column_name`]
/// must pass first, since those functions splice the value directly into
/// DDL/DML as a bare identifier rather than a literal.
pub fn validate_identifier(value: &str) -> StoreResult<()> {
    let ok = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!("invalid identifier: {value:?}")))
    }
}

/// Maps a FHIR resource type to its physical table name: `Patient` ->
/// `PatientTable`. Case is preserved on the type name.
pub fn table_name(resource_type: &str) -> String {
    format!("{resource_type}Table")
}

/// Maps a FHIR resource type to its primary key column name:
/// `Patient` -> `PATIENTTABLE_ID`.
pub fn primary_key(resource_type: &str) -> String {
    format!("{}TABLE_ID", resource_type.to_uppercase())
}

/// Maps a search-parameter name to its physical column name:
/// `general-practitioner` -> `GENERAL_PRACTITIONER`.
pub fn column_name(param: &str) -> String {
    param.to_uppercase().replace('-', "_")
}

/// Inverse of [`column_name`]: `GENERAL_PRACTITIONER` -> `general-practitioner`.
pub fn param_name(column: &str) -> String {
    column.to_lowercase().replace('_', "-")
}

/// The physical column(s) a search parameter of `param_type` occupies in a
/// resource table, with their SQL types. A token parameter occupies two
/// columns (code and system); a reference parameter occupies none — those
/// are never materialised as columns, only as edges.
pub fn column_specs(param_name: &str, param_type: SearchParamType) -> Vec<(String, &'static str)> {
    let base = column_name(param_name);
    match param_type {
        SearchParamType::String | SearchParamType::Uri | SearchParamType::Date => {
            vec![(base, "TEXT")]
        }
        SearchParamType::Number => vec![(base, "REAL")],
        SearchParamType::Token => vec![(base.clone(), "TEXT"), (format!("{base}_SYSTEM"), "TEXT")],
        SearchParamType::Reference => Vec::new(),
    }
}

/// The physical `(column, literal value)` pairs an extracted [`IndexValue`]
/// writes into a resource table row. Mirrors [`column_specs`]'s column
/// choice for each parameter type.
pub fn column_values(param_name: &str, value: &IndexValue) -> Vec<(String, SqlValue)> {
    let base = column_name(param_name);
    match value {
        IndexValue::Text(s) => vec![(base, SqlValue::Text(s.clone()))],
        IndexValue::Number(n) => vec![(base, SqlValue::Decimal(*n))],
        IndexValue::Date(s) => vec![(base, SqlValue::Text(s.clone()))],
        IndexValue::Token { system, code } => vec![
            (base.clone(), SqlValue::Text(code.clone())),
            (
                format!("{base}_SYSTEM"),
                system.clone().map(SqlValue::Text).unwrap_or(SqlValue::Null),
            ),
        ],
        IndexValue::Reference { .. } => Vec::new(),
    }
}

/// A value destined for a SQL literal or bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// A text value, escaped by doubling embedded single quotes.
    Text(String),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A decimal, rendered without redundant trailing zeros.
    Decimal(f64),
    /// A date-only value, rendered `'YYYY-MM-DD'`.
    Date(chrono::NaiveDate),
    /// A timestamp, rendered with millisecond precision.
    Timestamp(DateTime<Utc>),
    /// Opaque binary data; formatting is backend-specific.
    Blob(Vec<u8>),
}

/// Formats a [`SqlValue`] as a SQL literal fragment, backend-specific only
/// for [`SqlValue::Blob`].
///
/// Returns [`StoreError::Format`] if the value cannot be represented (never
/// happens for the variants above; reserved for future value kinds).
pub fn format_literal(value: &SqlValue, blob_literal: impl FnOnce(&[u8]) -> String) -> StoreResult<String> {
    Ok(match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Decimal(d) => {
            if !d.is_finite() {
                return Err(StoreError::Format(format!("non-finite decimal: {d}")));
            }
            format_decimal(*d)
        }
        SqlValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        SqlValue::Timestamp(ts) => format!("'{}'", format_timestamp_sql(*ts)),
        SqlValue::Blob(bytes) => blob_literal(bytes),
    })
}

/// Renders a decimal without scientific notation or trailing zeros beyond
/// what is needed to round-trip, for stable search-index column values.
fn format_decimal(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value}");
        s
    }
}

/// Formats a timestamp for a SQL literal: `HH:MM:SS.mmm`, clamped so
/// seconds fall in `[00.000, 59.999]` (sub-second precision is clamped to
/// milliseconds, never rounded up into the next second).
fn format_timestamp_sql(ts: DateTime<Utc>) -> String {
    let mut s = ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
    // `%.3f` always yields exactly 3 fractional digits; nanoseconds beyond
    // that are truncated (not rounded) by construction below.
    if let Some(dot) = s.find('.') {
        s.truncate(dot + 4);
    }
    s
}

/// ISO-8601 formatter used for `meta.lastUpdated` on responses, e.g.
/// `2024-05-01T12:00:00.000Z`.
pub fn format_last_updated(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Converts a scalar JSON value into a [`SqlValue::Text`]/[`SqlValue::Null`]
/// without interpretation — used for generic string/uri/token columns.
pub fn json_scalar_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Decimal(n.as_f64().unwrap_or(0.0))
            }
        }
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_primary_key_names() {
        assert_eq!(table_name("Patient"), "PatientTable");
        assert_eq!(primary_key("Patient"), "PATIENTTABLE_ID");
        assert_eq!(primary_key("Appointment"), "APPOINTMENTTABLE_ID");
    }

    #[test]
    fn validate_identifier_rejects_sql_metacharacters() {
        assert!(validate_identifier("Patient").is_ok());
        assert!(validate_identifier("general-practitioner").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("x\"; DROP TABLE \"REFERENCES\"; --").is_err());
        assert!(validate_identifier("Patient; DELETE FROM PatientTable").is_err());
    }

    #[test]
    fn column_name_roundtrip() {
        assert_eq!(column_name("general-practitioner"), "GENERAL_PRACTITIONER");
        assert_eq!(param_name("GENERAL_PRACTITIONER"), "general-practitioner");
    }

    #[test]
    fn format_literal_escapes_quotes() {
        let v = SqlValue::Text("O'Brien".to_string());
        let literal = format_literal(&v, |b| format!("X'{}'", hex::encode(b)));
        assert_eq!(literal.unwrap(), "'O''Brien'");
    }

    #[test]
    fn format_literal_null_and_bool() {
        assert_eq!(
            format_literal(&SqlValue::Null, |_| String::new()).unwrap(),
            "NULL"
        );
        assert_eq!(
            format_literal(&SqlValue::Bool(true), |_| String::new()).unwrap(),
            "TRUE"
        );
    }

    #[test]
    fn timestamp_clamps_to_milliseconds() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T10:20:30.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let literal = format_literal(&SqlValue::Timestamp(ts), |_| String::new()).unwrap();
        assert_eq!(literal, "'2024-01-01 10:20:30.123'");
    }

    #[test]
    fn token_param_occupies_two_columns() {
        let specs = column_specs("gender", SearchParamType::Token);
        assert_eq!(specs, vec![("GENDER".to_string(), "TEXT"), ("GENDER_SYSTEM".to_string(), "TEXT")]);
    }

    #[test]
    fn reference_param_occupies_no_columns() {
        assert!(column_specs("patient", SearchParamType::Reference).is_empty());
        let values = column_values(
            "patient",
            &IndexValue::Reference { target_type: "Patient".into(), target_id: "1".into() },
        );
        assert!(values.is_empty());
    }

    mod hex {
        pub fn encode(bytes: &[u8]) -> String {
            bytes.iter().map(|b| format!("{b:02x}")).collect()
        }
    }
}
