//! Update engine (C8, `PUT /{Type}/{id}` — full replace, no upsert).
//!
//! Shared with [`super::patch`], which pre-merges its request into a full
//! replacement body and calls [`apply_replace`] directly.

use chrono::Utc;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::extractor;
use crate::history::HistoryOperation;
use crate::naming::{self, SqlValue};
use crate::transaction::{self, TransactionContext};
use crate::types::StoredResource;

use super::{lit, Store};

pub(super) async fn update(store: &Store, resource_type: &str, id: &str, mut body: Value) -> StoreResult<StoredResource> {
    super::validate_resource_type(&body, resource_type)?;
    super::validate_id_match(&body, id)?;
    body.as_object_mut()
        .ok_or_else(|| StoreError::InvalidInput("resource body must be a JSON object".to_string()))?
        .insert("id".to_string(), Value::String(id.to_string()));

    apply_replace(store, resource_type, id, body, HistoryOperation::Update).await
}

/// Replaces the live row for `(resource_type, id)` with `body`, recording
/// `operation` (`Update` or `Patch`) in history. Requires the resource to
/// already exist; there is no upsert.
pub(super) async fn apply_replace(
    store: &Store,
    resource_type: &str,
    id: &str,
    body: Value,
    operation: HistoryOperation,
) -> StoreResult<StoredResource> {
    let existing_row = store
        .fetch_row(resource_type, id)
        .await?
        .ok_or_else(|| StoreError::not_found(resource_type, id))?;
    let backup_resource = super::row_to_resource(resource_type, &existing_row)?;
    let backup_edges = store.references.edges_by_source(resource_type, id).await?;
    let new_version = backup_resource.version_id() + 1;

    let catalog_entries = store.catalog.params_for_type(resource_type).await?;
    let extraction = extractor::extract(&store.catalog, resource_type, id, &body).await?;
    store.assert_references_exist(&extraction.edges).await?;

    let standard_columns: Vec<(String, crate::types::SearchParamType)> = catalog_entries
        .iter()
        .filter(|e| !e.is_custom)
        .map(|e| (e.name.clone(), e.param_type))
        .collect();
    store.backend.ensure_resource_table(resource_type, &standard_columns).await?;

    let table = naming::table_name(resource_type);
    let pk = naming::primary_key(resource_type);
    let now = Utc::now();

    let mut assignments = vec![
        ("VERSION_ID".to_string(), SqlValue::Integer(new_version as i64)),
        ("LAST_UPDATED".to_string(), SqlValue::Timestamp(now)),
        ("CONTENT".to_string(), SqlValue::Text(body.to_string())),
    ];
    assignments.extend(super::standard_column_assignments(&catalog_entries, &extraction));

    let mut set_clauses = Vec::with_capacity(assignments.len());
    for (column, value) in &assignments {
        let literal = naming::format_literal(value, |b| store.backend.format_blob_literal(b))?;
        set_clauses.push(format!("{column} = {literal}"));
    }
    let update_sql = format!("UPDATE {table} SET {} WHERE {pk} = {}", set_clauses.join(", "), lit(id));

    let mut ctx = TransactionContext::for_update(resource_type, id, new_version, backup_resource.clone(), backup_edges);

    let outcome: StoreResult<StoredResource> = async {
        store.references.delete_edges_by_source(resource_type, id).await?;
        store.backend.execute(&update_sql).await?;

        if resource_type == "SearchParameter" {
            super::sync_search_parameter_catalog(store, &body).await?;
        }

        store
            .history
            .append(resource_type, id, new_version, operation, &body)
            .await?;

        super::rewrite_custom_params(store, resource_type, id, &extraction.custom).await?;

        for edge in &extraction.edges {
            let edge_id = store.references.insert_edge(edge).await?;
            ctx.record_inserted_edge(edge_id);
        }

        Ok(StoredResource::new(
            resource_type,
            id.to_string(),
            new_version,
            backup_resource.created_at(),
            now,
            body.clone(),
        ))
    }
    .await;

    match outcome {
        Ok(resource) => {
            ctx.commit();
            Ok(resource)
        }
        Err(err) => {
            transaction::rollback_update(
                ctx,
                &store.history,
                &store.references,
                super::restore_row_update(store, resource_type, &existing_row),
            )
            .await;
            Err(err)
        }
    }
}
