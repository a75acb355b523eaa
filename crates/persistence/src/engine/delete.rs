//! Delete engine (C8, `DELETE /{Type}/{id}` — hard delete).
//!
//! History is appended before the row and edges are removed, so a failure
//! partway through still leaves the last live state recoverable from
//! history even if the row delete itself never runs.

use crate::error::{StoreError, StoreResult};
use crate::history::HistoryOperation;
use crate::naming;
use crate::transaction::{self, TransactionContext};

use super::{lit, Store};

pub(super) async fn delete(store: &Store, resource_type: &str, id: &str) -> StoreResult<()> {
    let existing_row = store
        .fetch_row(resource_type, id)
        .await?
        .ok_or_else(|| StoreError::not_found(resource_type, id))?;
    let backup_resource = super::row_to_resource(resource_type, &existing_row)?;
    let backup_edges = store.references.edges_by_source(resource_type, id).await?;
    let new_version = backup_resource.version_id() + 1;

    let table = naming::table_name(resource_type);
    let pk = naming::primary_key(resource_type);

    let mut ctx = TransactionContext::for_delete(resource_type, id, new_version, backup_resource.clone(), backup_edges);

    let outcome: StoreResult<()> = async {
        store
            .history
            .append(resource_type, id, new_version, HistoryOperation::Delete, backup_resource.raw_content())
            .await?;

        store
            .backend
            .execute(&format!(
                "DELETE FROM CUSTOM_EXTENSION_SEARCH_PARAMS WHERE RESOURCE_TYPE = {} AND RESOURCE_ID = {}",
                lit(resource_type),
                lit(id)
            ))
            .await?;

        if resource_type == "SearchParameter" {
            super::remove_search_parameter_catalog(store, backup_resource.raw_content()).await?;
        }

        store.references.delete_edges_by_source(resource_type, id).await?;

        store
            .backend
            .execute(&format!("DELETE FROM {table} WHERE {pk} = {}", lit(id)))
            .await?;

        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => {
            ctx.commit();
            Ok(())
        }
        Err(err) => {
            transaction::rollback_delete(
                ctx,
                &store.history,
                &store.references,
                super::restore_row_insert(store, resource_type, &existing_row),
            )
            .await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::backends::sqlite::SqliteBackend;
    use crate::engine::{Store, StoreConfig};
    use crate::error::StoreError;

    async fn store() -> Store {
        let backend = Arc::new(SqliteBackend::in_memory().unwrap());
        let store = Store::new(backend, StoreConfig::default());
        store.bootstrap().await.unwrap();
        store
    }

    #[tokio::test]
    async fn delete_then_read_returns_not_found() {
        let store = store().await;
        let created = store.create("Patient", json!({"resourceType": "Patient"})).await.unwrap();
        store.delete("Patient", created.id()).await.unwrap();
        let err = store.read("Patient", created.id()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_appends_history_entry_and_removes_edges() {
        let store = store().await;
        let patient = store.create("Patient", json!({"resourceType": "Patient"})).await.unwrap();
        let appointment = store
            .create(
                "Appointment",
                json!({
                    "resourceType": "Appointment",
                    "status": "booked",
                    "participant": [{"actor": {"reference": format!("Patient/{}", patient.id())}}]
                }),
            )
            .await
            .unwrap();
        store.delete("Appointment", appointment.id()).await.unwrap();
        let history = store.history_instance("Appointment", appointment.id()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].resource.version_id(), 2);
        assert_eq!(history[0].operation, crate::history::HistoryOperation::Delete);
        assert_eq!(history[1].operation, crate::history::HistoryOperation::Create);
    }

    #[tokio::test]
    async fn delete_rejects_nonexistent_id() {
        let store = store().await;
        let err = store.delete("Patient", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
