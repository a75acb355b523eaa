//! Search engine (C9): query classification, predicate compilation, and
//! `_include`/`_revinclude` resolution.
//!
//! A query string's parameters split into three kinds of constraint:
//! standard (catalog, non-custom) parameters compile straight into a `WHERE`
//! clause on the resource's own table; custom parameters compile into a
//! lookup against `CUSTOM_EXTENSION_SEARCH_PARAMS`; reference parameters
//! never touch a column at all and instead walk the edge table. The three
//! kinds are intersected by id before the final page is fetched.

use std::collections::HashSet;

use serde_json::Value;

use crate::catalog::CatalogEntry;
use crate::error::{StoreError, StoreResult};
use crate::fhirpath;
use crate::naming::{self, SqlValue};
use crate::types::{Comparator, IncludeDirective, IncludeKind, ParsedParam, SearchParamType, SortDirective};

use super::{lit, Bundle, BundleEntry, SearchMode, Store};

const CONTROL_PARAMS: &[&str] =
    &["_id", "_lastUpdated", "_profile", "_include", "_revinclude", "_count", "_sort"];

enum Compiled {
    Condition(String),
    IdSet(HashSet<String>),
}

pub(super) async fn search(
    store: &Store,
    resource_type: &str,
    raw_params: &[(String, String)],
    page: usize,
) -> StoreResult<Bundle> {
    let table = naming::table_name(resource_type);
    let columns = store.backend.table_columns(&table).await?;
    if columns.is_empty() {
        return Ok(Bundle::new(0, Vec::new()));
    }
    let column_set: HashSet<String> = columns.iter().map(|c| c.to_uppercase()).collect();

    let mut conditions = Vec::new();
    let mut id_set_constraints: Vec<HashSet<String>> = Vec::new();
    let mut includes = Vec::new();
    let mut revincludes = Vec::new();
    let mut count = store.config.default_page_size;
    let mut sort = None;

    for (key, value) in raw_params {
        if let Some(name) = key.strip_prefix('_') {
            if !CONTROL_PARAMS.contains(&key.as_str()) {
                return Err(StoreError::UnsupportedParameter(key.clone()));
            }
            match name {
                "id" => conditions.push(format!("{} = {}", naming::primary_key(resource_type), lit(value))),
                "lastUpdated" => {
                    let (cmp, rest) = Comparator::parse_prefix(value);
                    conditions.push(format!("LAST_UPDATED {} {}", cmp.sql_operator(), lit(rest)));
                }
                "profile" => conditions.push(format!("CONTENT LIKE {}", lit(&format!("%{value}%")))),
                "include" => includes.push(IncludeDirective::parse(IncludeKind::Include, value)),
                "revinclude" => revincludes.push(IncludeDirective::parse(IncludeKind::RevInclude, value)),
                "count" => {
                    if let Ok(n) = value.parse::<usize>() {
                        count = n.clamp(1, store.config.max_page_size);
                    }
                }
                "sort" => sort = Some(SortDirective::parse(value)),
                _ => unreachable!("only whitelisted control parameters reach this match"),
            }
            continue;
        }

        let entry = match store.catalog.find(resource_type, key).await? {
            Some(e) => e,
            None => continue, // unrecognized parameter: ignored, not rejected
        };
        let parsed = classify_param(key, value, &entry);
        match compile_param(store, resource_type, &column_set, &entry, &parsed).await? {
            Compiled::Condition(c) => conditions.push(c),
            Compiled::IdSet(ids) => id_set_constraints.push(ids),
        }
    }

    let mut restricted_ids: Option<HashSet<String>> = None;
    for ids in id_set_constraints {
        restricted_ids = Some(match restricted_ids {
            None => ids,
            Some(acc) => acc.intersection(&ids).cloned().collect(),
        });
    }
    if let Some(ids) = &restricted_ids {
        if ids.is_empty() {
            return Ok(Bundle::new(0, Vec::new()));
        }
        let pk = naming::primary_key(resource_type);
        let list = ids.iter().map(|id| lit(id)).collect::<Vec<_>>().join(", ");
        conditions.push(format!("{pk} IN ({list})"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let total_rows = store.backend.query(&format!("SELECT COUNT(*) AS N FROM {table}{where_clause}")).await?;
    let total = total_rows
        .first()
        .and_then(|r| r.get("N"))
        .and_then(Value::as_i64)
        .unwrap_or(0) as usize;

    // Absent `_sort`, rows come back in whatever order the backend returns
    // them without an ORDER BY — insertion order, not a synthesized default.
    let order_clause = sort.as_ref().map(|s| order_by_clause(resource_type, s)).unwrap_or_default();
    let offset = page * count;
    let page_sql = format!("SELECT * FROM {table}{where_clause}{order_clause} LIMIT {count} OFFSET {offset}");
    let rows = store.backend.query(&page_sql).await?;

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut entries = Vec::new();
    for row in &rows {
        let resource = super::row_to_resource(resource_type, row)?;
        seen.insert((resource_type.to_string(), resource.id().to_string()));
        entries.push(BundleEntry {
            resource_type: resource_type.to_string(),
            id: resource.id().to_string(),
            content: resource.content(),
            mode: SearchMode::Match,
        });
    }

    let matched_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
    for directive in &includes {
        resolve_forward_include(store, resource_type, &matched_ids, directive, &mut seen, &mut entries).await?;
    }
    for directive in &revincludes {
        resolve_reverse_include(store, resource_type, &matched_ids, directive, &mut seen, &mut entries).await?;
    }

    Ok(Bundle::new(total, entries))
}

fn classify_param(key: &str, value: &str, entry: &CatalogEntry) -> ParsedParam {
    match entry.param_type {
        SearchParamType::Reference => {
            let (target_type, target_id) = split_reference(value);
            ParsedParam::Reference { name: key.to_string(), target_type, target_id }
        }
        SearchParamType::Token => {
            let (system, code) = split_token(value);
            ParsedParam::Token { name: key.to_string(), system, code }
        }
        SearchParamType::Date | SearchParamType::Number => {
            let (comparator, rest) = Comparator::parse_prefix(value);
            ParsedParam::Comparable {
                name: key.to_string(),
                param_type: entry.param_type,
                comparator,
                value: rest.to_string(),
            }
        }
        SearchParamType::String | SearchParamType::Uri => {
            ParsedParam::StringMatch { name: key.to_string(), value: value.to_string() }
        }
    }
}

fn split_reference(value: &str) -> (Option<String>, String) {
    match value.split_once('/') {
        Some((t, i)) => (Some(t.to_string()), i.to_string()),
        None => (None, value.to_string()),
    }
}

fn split_token(value: &str) -> (Option<String>, Option<String>) {
    match value.split_once('|') {
        Some((system, code)) => (
            (!system.is_empty()).then(|| system.to_string()),
            (!code.is_empty()).then(|| code.to_string()),
        ),
        None => (None, Some(value.to_string())),
    }
}

async fn compile_param(
    store: &Store,
    resource_type: &str,
    column_set: &HashSet<String>,
    entry: &CatalogEntry,
    param: &ParsedParam,
) -> StoreResult<Compiled> {
    if entry.param_type == SearchParamType::Reference {
        if let ParsedParam::Reference { target_type, target_id, .. } = param {
            let inferred = target_type.clone().or_else(|| fhirpath::leaf_and_target_type(&entry.expression).1);
            let Some(target_type) = inferred else {
                return Ok(Compiled::IdSet(HashSet::new()));
            };
            let sources = store.references.distinct_sources(&target_type, target_id, Some(resource_type), None).await?;
            return Ok(Compiled::IdSet(sources.into_iter().map(|(_, id)| id).collect()));
        }
        return Ok(Compiled::IdSet(HashSet::new()));
    }

    if entry.is_custom {
        return Ok(Compiled::IdSet(custom_param_matches(store, resource_type, entry, param).await?));
    }

    let column = naming::column_name(&entry.name);
    if !column_set.contains(&column) {
        return Ok(Compiled::IdSet(HashSet::new()));
    }

    match param {
        ParsedParam::Token { system, code, .. } => {
            let mut parts = Vec::new();
            if let Some(code) = code {
                parts.push(format!("{column} = {}", lit(code)));
            }
            if let Some(system) = system {
                parts.push(format!("{column}_SYSTEM = {}", lit(system)));
            }
            Ok(Compiled::Condition(parts.join(" AND ")))
        }
        ParsedParam::Comparable { comparator, value, param_type, .. } => {
            let literal = numeric_or_text_literal(*param_type, value)?;
            Ok(Compiled::Condition(format!("{column} {} {literal}", comparator.sql_operator())))
        }
        ParsedParam::StringMatch { value, .. } => {
            Ok(Compiled::Condition(format!("{column} LIKE {}", lit(&format!("%{value}%")))))
        }
        _ => Ok(Compiled::Condition(String::new())),
    }
}

fn numeric_or_text_literal(param_type: SearchParamType, value: &str) -> StoreResult<String> {
    match param_type {
        SearchParamType::Number => {
            let n: f64 = value.parse().map_err(|_| StoreError::InvalidInput(format!("invalid number value: {value}")))?;
            naming::format_literal(&SqlValue::Decimal(n), |_| unreachable!())
        }
        _ => Ok(lit(value)),
    }
}

/// Resolves a token/comparable/string-match constraint against the
/// `CUSTOM_EXTENSION_SEARCH_PARAMS` EAV table.
async fn custom_param_matches(
    store: &Store,
    resource_type: &str,
    entry: &CatalogEntry,
    param: &ParsedParam,
) -> StoreResult<HashSet<String>> {
    let mut sql = format!(
        "SELECT DISTINCT RESOURCE_ID FROM CUSTOM_EXTENSION_SEARCH_PARAMS WHERE RESOURCE_TYPE = {} AND PARAM_NAME = {}",
        lit(resource_type),
        lit(&entry.name)
    );
    match param {
        ParsedParam::Token { system, code, .. } => {
            if let Some(code) = code {
                sql.push_str(&format!(" AND VALUE_TOKEN_CODE = {}", lit(code)));
            }
            if let Some(system) = system {
                sql.push_str(&format!(" AND VALUE_TOKEN_SYSTEM = {}", lit(system)));
            }
        }
        ParsedParam::Comparable { comparator, value, param_type, .. } => {
            let column = if *param_type == SearchParamType::Number { "VALUE_NUMBER" } else { "VALUE_DATE" };
            let literal = numeric_or_text_literal(*param_type, value)?;
            sql.push_str(&format!(" AND {column} {} {literal}", comparator.sql_operator()));
        }
        ParsedParam::StringMatch { value, .. } => {
            sql.push_str(&format!(" AND VALUE_TEXT LIKE {}", lit(&format!("%{value}%"))));
        }
        _ => {}
    }
    let rows = store.backend.query(&sql).await?;
    Ok(rows.iter().filter_map(|r| r.get("RESOURCE_ID").and_then(Value::as_str).map(str::to_string)).collect())
}

fn order_by_clause(resource_type: &str, sort: &SortDirective) -> String {
    let column = match sort.field.as_str() {
        "_lastUpdated" => "LAST_UPDATED".to_string(),
        "_id" => naming::primary_key(resource_type),
        field => naming::column_name(field),
    };
    let direction = if sort.descending { "DESC" } else { "ASC" };
    format!(" ORDER BY {column} {direction}")
}

/// `_include=SourceType:param[:TargetType]` or `_include=*`: walk the edges
/// leaving each matched resource.
async fn resolve_forward_include(
    store: &Store,
    resource_type: &str,
    matched_ids: &[String],
    directive: &IncludeDirective,
    seen: &mut HashSet<(String, String)>,
    entries: &mut Vec<BundleEntry>,
) -> StoreResult<()> {
    if !directive.wildcard && directive.source_type.as_deref() != Some(resource_type) {
        return Ok(());
    }
    let leaf = if directive.wildcard {
        None
    } else {
        let param_name = directive.search_param.as_deref().unwrap_or_default();
        match store.catalog.find(resource_type, param_name).await? {
            Some(entry) => Some(fhirpath::leaf_and_target_type(&entry.expression).0),
            None => return Ok(()),
        }
    };
    for id in matched_ids {
        let targets = store
            .references
            .distinct_targets(resource_type, id, leaf.as_deref(), directive.target_type.as_deref())
            .await?;
        for (target_type, target_id) in targets {
            add_included_resource(store, target_type, target_id, seen, entries).await?;
        }
    }
    Ok(())
}

/// `_revinclude=SourceType:param[:TargetType]`: find resources of
/// `SourceType` that reference each matched resource via `param`.
async fn resolve_reverse_include(
    store: &Store,
    resource_type: &str,
    matched_ids: &[String],
    directive: &IncludeDirective,
    seen: &mut HashSet<(String, String)>,
    entries: &mut Vec<BundleEntry>,
) -> StoreResult<()> {
    if directive.wildcard {
        return Ok(()); // no source type to resolve the expression against
    }
    let Some(source_type) = directive.source_type.as_deref() else {
        return Ok(());
    };
    let param_name = directive.search_param.as_deref().unwrap_or_default();
    let Some(entry) = store.catalog.find(source_type, param_name).await? else {
        return Ok(());
    };
    let leaf = fhirpath::leaf_and_target_type(&entry.expression).0;
    for id in matched_ids {
        let sources = store.references.distinct_sources(resource_type, id, Some(source_type), Some(&leaf)).await?;
        for (src_type, src_id) in sources {
            add_included_resource(store, src_type, src_id, seen, entries).await?;
        }
    }
    Ok(())
}

async fn add_included_resource(
    store: &Store,
    resource_type: String,
    id: String,
    seen: &mut HashSet<(String, String)>,
    entries: &mut Vec<BundleEntry>,
) -> StoreResult<()> {
    if !seen.insert((resource_type.clone(), id.clone())) {
        return Ok(());
    }
    if let Some(row) = store.fetch_row(&resource_type, &id).await? {
        let resource = super::row_to_resource(&resource_type, &row)?;
        entries.push(BundleEntry { resource_type, id, content: resource.content(), mode: SearchMode::Include });
    }
    Ok(())
}
