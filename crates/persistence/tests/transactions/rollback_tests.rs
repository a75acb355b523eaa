//! Compensating-rollback coverage for the create/update write engines.
//!
//! A `SearchParameter` with a missing `type` fails catalog sync after the
//! row has already been written, which is the cleanest external hook into
//! [`fhir_persistence::transaction::rollback_create`]/`rollback_update`
//! without reaching into engine internals.

use serde_json::json;

use fhir_persistence::engine::Store;
use fhir_persistence::error::StoreError;

use crate::common;

fn broken_search_parameter(code: &str) -> serde_json::Value {
    json!({
        "resourceType": "SearchParameter",
        "code": code,
        "base": ["Patient"],
    })
}

async fn case_create_rollback_deletes_row_on_catalog_sync_failure(store: &Store) {
    let err = store
        .create("SearchParameter", broken_search_parameter("custom-height"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let bundle = store
        .search("SearchParameter", &[("code".to_string(), "custom-height".to_string())], 0)
        .await
        .unwrap();
    assert!(bundle.entries.is_empty(), "rolled-back create must leave no row behind");
}

async fn case_update_rollback_restores_previous_version(store: &Store) {
    let created = store
        .create(
            "SearchParameter",
            json!({
                "resourceType": "SearchParameter",
                "code": "custom-weight",
                "base": ["Patient"],
                "type": "number",
            }),
        )
        .await
        .unwrap();

    let err = store
        .update(
            "SearchParameter",
            created.id(),
            json!({
                "resourceType": "SearchParameter",
                "id": created.id(),
                "code": "custom-weight",
                "base": ["Patient"],
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let restored = store.read("SearchParameter", created.id()).await.unwrap();
    assert_eq!(restored.version_id(), 1);
    assert_eq!(restored.content()["type"], "number");
}

#[tokio::test]
async fn create_rollback_deletes_row_on_catalog_sync_failure_sqlite() {
    case_create_rollback_deletes_row_on_catalog_sync_failure(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn create_rollback_deletes_row_on_catalog_sync_failure_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_create_rollback_deletes_row_on_catalog_sync_failure(&store).await;
    }
}

#[tokio::test]
async fn update_rollback_restores_previous_version_sqlite() {
    case_update_rollback_restores_previous_version(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn update_rollback_restores_previous_version_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_update_rollback_restores_previous_version(&store).await;
    }
}
