//! Mines indexable values out of a resource (C5).
//!
//! For every catalog row that applies to a resource's type, the extractor
//! evaluates the row's FHIRPath expression against the resource and
//! converts whatever comes back into an [`IndexValue`]. Standard
//! (non-custom) parameters land in a single typed column — when an
//! expression yields more than one value (a patient with two `name.family`
//! entries, say), only the first is kept, trading recall on repeating
//! elements for an indexed column per parameter. Custom parameters go to
//! the EAV side table instead, which keeps every value. Reference-typed
//! parameters never touch a column at all: they become edges in the
//! reference graph regardless of whether the parameter is standard or
//! custom.
//!
//! A single parameter failing to extract (wrong JSON shape, an
//! unparseable reference) does not fail the write — it is logged and
//! skipped, leaving the rest of the resource's search index intact.

use serde_json::Value;

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::StoreResult;
use crate::fhirpath;
use crate::references::NewEdge;
use crate::types::{IndexValue, SearchParamType};

/// One value extracted for a custom (EAV) search parameter.
#[derive(Debug, Clone)]
pub struct CustomParamValue {
    /// Search parameter name (`SearchParameter.code`).
    pub name: String,
    /// Extracted, typed value.
    pub value: IndexValue,
}

/// Everything mined out of one resource write.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// `(column name, value)` pairs destined for the resource's typed
    /// index columns.
    pub columns: Vec<(String, IndexValue)>,
    /// Values destined for `CUSTOM_EXTENSION_SEARCH_PARAMS`.
    pub custom: Vec<CustomParamValue>,
    /// Reference edges destined for `REFERENCES`.
    pub edges: Vec<NewEdge>,
}

/// Extracts every indexable value for `resource` (of `resource_type`,
/// logical id `id`) using the current catalog.
pub async fn extract(
    catalog: &Catalog,
    resource_type: &str,
    id: &str,
    resource: &Value,
) -> StoreResult<ExtractionResult> {
    let entries = catalog.params_for_type(resource_type).await?;
    let mut result = ExtractionResult::default();

    for entry in entries {
        let raw_values = fhirpath::evaluate(resource, &entry.expression);
        if raw_values.is_empty() {
            continue;
        }

        if entry.param_type == SearchParamType::Reference {
            extract_reference_param(&entry, resource_type, id, &raw_values, &mut result.edges);
            continue;
        }

        let mut converted = Vec::with_capacity(raw_values.len());
        for raw in &raw_values {
            match convert_scalar(entry.param_type, raw) {
                Ok(Some(value)) => converted.push(value),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        resource_type,
                        id,
                        param = %entry.name,
                        expression = %entry.expression,
                        error = %err,
                        "skipping search parameter value with unexpected shape",
                    );
                }
            }
        }
        if converted.is_empty() {
            continue;
        }

        if entry.is_custom {
            result
                .custom
                .extend(converted.into_iter().map(|value| CustomParamValue {
                    name: entry.name.clone(),
                    value,
                }));
        } else {
            result.columns.push((entry.name, converted.into_iter().next().unwrap()));
        }
    }

    Ok(result)
}

fn extract_reference_param(
    entry: &CatalogEntry,
    resource_type: &str,
    id: &str,
    raw_values: &[Value],
    edges: &mut Vec<NewEdge>,
) {
    let (leaf, _target_type_hint) = fhirpath::leaf_and_target_type(&entry.expression);
    for raw in raw_values {
        match parse_reference(raw) {
            Some(parsed) => edges.push(NewEdge {
                source_type: resource_type.to_string(),
                source_id: id.to_string(),
                source_expression: leaf.clone(),
                target_type: parsed.target_type,
                target_id: parsed.target_id,
                display_value: parsed.display,
            }),
            None => tracing::warn!(
                resource_type,
                id,
                param = %entry.name,
                "skipping reference search parameter: not a Reference-shaped value",
            ),
        }
    }
}

struct ParsedReference {
    target_type: String,
    target_id: String,
    display: Option<String>,
}

/// Parses a FHIR `Reference` element (`{"reference": "Patient/123", ...}`)
/// into its target type and id. Contained (`#id`) and absolute-URL
/// references are not resolved; only the relative `Type/id` shape is
/// recognised.
fn parse_reference(value: &Value) -> Option<ParsedReference> {
    let obj = value.as_object()?;
    let reference = obj.get("reference")?.as_str()?;
    let (target_type, target_id) = reference.split_once('/')?;
    if target_type.is_empty() || target_id.is_empty() {
        return None;
    }
    let display = obj.get("display").and_then(Value::as_str).map(str::to_string);
    Some(ParsedReference {
        target_type: target_type.to_string(),
        target_id: target_id.to_string(),
        display,
    })
}

/// Converts one raw JSON value into the [`IndexValue`] shape its declared
/// [`SearchParamType`] expects. `Ok(None)` means "present but not
/// indexable" (e.g. an empty string); `Err` means the JSON shape itself
/// didn't match the declared type.
fn convert_scalar(param_type: SearchParamType, value: &Value) -> StoreResult<Option<IndexValue>> {
    use crate::error::StoreError;

    match param_type {
        SearchParamType::String | SearchParamType::Uri => match value.as_str() {
            Some(s) if !s.is_empty() => Ok(Some(IndexValue::Text(s.to_string()))),
            Some(_) => Ok(None),
            None => Err(StoreError::Format(format!(
                "expected string/uri value, found {value}"
            ))),
        },
        SearchParamType::Number => match value.as_f64() {
            Some(n) => Ok(Some(IndexValue::Number(n))),
            None => Err(StoreError::Format(format!("expected numeric value, found {value}"))),
        },
        SearchParamType::Date => match value.as_str() {
            Some(s) if !s.is_empty() => Ok(Some(IndexValue::Date(s.to_string()))),
            Some(_) => Ok(None),
            None => Err(StoreError::Format(format!("expected date value, found {value}"))),
        },
        SearchParamType::Token => match value {
            Value::String(s) if !s.is_empty() => Ok(Some(IndexValue::Token {
                system: None,
                code: s.clone(),
            })),
            Value::Object(obj) => {
                let code = obj
                    .get("code")
                    .or_else(|| obj.get("value"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::Format(format!("token value missing code: {value}")))?;
                let system = obj.get("system").and_then(Value::as_str).map(str::to_string);
                Ok(Some(IndexValue::Token {
                    system,
                    code: code.to_string(),
                }))
            }
            Value::String(_) => Ok(None),
            _ => Err(StoreError::Format(format!("expected token-shaped value, found {value}"))),
        },
        SearchParamType::Reference => unreachable!("reference params are handled separately"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Backend;
    use serde_json::json;

    #[test]
    fn converts_plain_string_token() {
        let v = convert_scalar(SearchParamType::Token, &json!("male")).unwrap().unwrap();
        assert_eq!(v, IndexValue::Token { system: None, code: "male".into() });
    }

    #[test]
    fn converts_coding_token() {
        let coding = json!({"system": "http://hl7.org/fhir/sid/us-ssn", "code": "123-45"});
        let v = convert_scalar(SearchParamType::Token, &coding).unwrap().unwrap();
        assert_eq!(
            v,
            IndexValue::Token {
                system: Some("http://hl7.org/fhir/sid/us-ssn".into()),
                code: "123-45".into()
            }
        );
    }

    #[test]
    fn rejects_wrong_shape_for_number() {
        let err = convert_scalar(SearchParamType::Number, &json!("not-a-number"));
        assert!(err.is_err());
    }

    #[test]
    fn parses_relative_reference() {
        let parsed = parse_reference(&json!({"reference": "Patient/123", "display": "Jane Doe"})).unwrap();
        assert_eq!(parsed.target_type, "Patient");
        assert_eq!(parsed.target_id, "123");
        assert_eq!(parsed.display.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn rejects_absolute_url_reference() {
        assert!(parse_reference(&json!({"reference": "urn:uuid:abc"})).is_none());
    }

    #[tokio::test]
    async fn extracts_columns_and_edges_from_appointment() {
        let backend = std::sync::Arc::new(crate::backends::sqlite::SqliteBackend::in_memory().unwrap());
        backend.bootstrap().await.unwrap();
        let catalog = Catalog::new(backend.clone());
        catalog.ensure_seeded().await.unwrap();

        let appointment = json!({
            "resourceType": "Appointment",
            "status": "booked",
            "start": "2024-01-01T10:00:00Z",
            "participant": [
                {"actor": {"reference": "Patient/1", "display": "Jane"}},
                {"actor": {"reference": "Practitioner/2"}}
            ]
        });
        let result = extract(&catalog, "Appointment", "a1", &appointment).await.unwrap();

        assert!(result
            .columns
            .iter()
            .any(|(name, v)| name == "status" && *v == IndexValue::Token { system: None, code: "booked".into() }));
        assert_eq!(result.edges.len(), 2);
        assert!(result.edges.iter().any(|e| e.target_type == "Patient" && e.target_id == "1"));
        assert!(result.edges.iter().any(|e| e.target_type == "Practitioner" && e.target_id == "2"));
    }
}
