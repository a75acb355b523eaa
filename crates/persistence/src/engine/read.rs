//! Read engine (C9): instance read, version read, and instance history.

use crate::error::{StoreError, StoreResult};
use crate::history::HistoryRecord;
use crate::types::StoredResource;

use super::Store;

pub(super) async fn read(store: &Store, resource_type: &str, id: &str) -> StoreResult<StoredResource> {
    let row = store
        .fetch_row(resource_type, id)
        .await?
        .ok_or_else(|| StoreError::not_found(resource_type, id))?;
    super::row_to_resource(resource_type, &row)
}

pub(super) async fn vread(
    store: &Store,
    resource_type: &str,
    id: &str,
    version_id: u64,
) -> StoreResult<StoredResource> {
    store
        .history
        .by_version(resource_type, id, version_id)
        .await?
        .map(|record| record.resource)
        .ok_or_else(|| StoreError::version_not_found(resource_type, id, version_id))
}

pub(super) async fn history_instance(
    store: &Store,
    resource_type: &str,
    id: &str,
) -> StoreResult<Vec<HistoryRecord>> {
    let versions = store.history.all_versions(resource_type, id).await?;
    if versions.is_empty() {
        return Err(StoreError::not_found(resource_type, id));
    }
    Ok(versions)
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
    async fn read_after_write_returns_written_content() {
        let store = store().await;
        let created = store
            .create("Patient", json!({"resourceType": "Patient", "name": [{"family": "Doe"}]}))
            .await
            .unwrap();
        let read_back = store.read("Patient", created.id()).await.unwrap();
        assert_eq!(read_back.content()["name"][0]["family"], "Doe");
        assert_eq!(read_back.version_id(), 1);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let store = store().await;
        let err = store.read("Patient", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn vread_fetches_prior_version() {
        let store = store().await;
        let created = store
            .create("Patient", json!({"resourceType": "Patient", "name": [{"family": "Doe"}]}))
            .await
            .unwrap();
        store
            .update(
                "Patient",
                created.id(),
                json!({"resourceType": "Patient", "id": created.id(), "name": [{"family": "Smith"}]}),
            )
            .await
            .unwrap();
        let v1 = store.vread("Patient", created.id(), 1).await.unwrap();
        assert_eq!(v1.content()["name"][0]["family"], "Doe");
    }
}
