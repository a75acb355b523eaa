//! Create engine (C8, `POST /{Type}`).
//!
//! Ordering matters for crash-consistency: the main row is inserted before
//! the history entry so the history snapshot can quote a row that's already
//! live, and every step after the insert is covered by [`rollback_create`].

use chrono::Utc;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::extractor;
use crate::history::HistoryOperation;
use crate::naming::{self, SqlValue};
use crate::transaction::{self, TransactionContext};
use crate::types::StoredResource;

use super::{lit, Store};

pub(super) async fn create(store: &Store, resource_type: &str, mut body: Value) -> StoreResult<StoredResource> {
    super::validate_resource_type(&body, resource_type)?;

    let id = super::resolve_id(store, &body)?;
    body.as_object_mut()
        .ok_or_else(|| StoreError::InvalidInput("resource body must be a JSON object".to_string()))?
        .insert("id".to_string(), Value::String(id.clone()));

    if store.fetch_row(resource_type, &id).await?.is_some() {
        return Err(StoreError::Conflict {
            resource_type: resource_type.to_string(),
            id,
        });
    }

    let catalog_entries = store.catalog.params_for_type(resource_type).await?;
    let extraction = extractor::extract(&store.catalog, resource_type, &id, &body).await?;
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
    let version_id = 1u64;

    let mut assignments = vec![
        (pk.clone(), SqlValue::Text(id.clone())),
        ("VERSION_ID".to_string(), SqlValue::Integer(version_id as i64)),
        ("CREATED_AT".to_string(), SqlValue::Timestamp(now)),
        ("LAST_UPDATED".to_string(), SqlValue::Timestamp(now)),
        ("CONTENT".to_string(), SqlValue::Text(body.to_string())),
    ];
    assignments.extend(super::standard_column_assignments(&catalog_entries, &extraction));

    let mut columns = Vec::with_capacity(assignments.len());
    let mut literals = Vec::with_capacity(assignments.len());
    for (column, value) in &assignments {
        columns.push(column.clone());
        literals.push(naming::format_literal(value, |b| store.backend.format_blob_literal(b))?);
    }
    let insert_sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        literals.join(", ")
    );

    let mut ctx = TransactionContext::for_create(resource_type, &id, version_id);

    let outcome: StoreResult<StoredResource> = async {
        store.backend.execute(&insert_sql).await?;

        if resource_type == "SearchParameter" {
            super::sync_search_parameter_catalog(store, &body).await?;
        }

        store
            .history
            .append(resource_type, &id, version_id, HistoryOperation::Create, &body)
            .await?;

        super::rewrite_custom_params(store, resource_type, &id, &extraction.custom).await?;

        for edge in &extraction.edges {
            let edge_id = store.references.insert_edge(edge).await?;
            ctx.record_inserted_edge(edge_id);
        }

        Ok(StoredResource::new(resource_type, id.clone(), version_id, now, now, body.clone()))
    }
    .await;

    match outcome {
        Ok(resource) => {
            ctx.commit();
            Ok(resource)
        }
        Err(err) => {
            let delete_sql = format!("DELETE FROM {table} WHERE {pk} = {}", lit(&id));
            transaction::rollback_create(ctx, &store.history, &store.references, async {
                store.backend.execute(&delete_sql).await.map(|_| ())
            })
            .await;
            Err(err)
        }
    }
}
