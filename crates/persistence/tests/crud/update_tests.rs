//! `PUT /{Type}/{id}` integration coverage, run against both backends.

use serde_json::json;

use fhir_persistence::engine::Store;
use fhir_persistence::error::StoreError;

use crate::common;

async fn case_update_bumps_version_and_preserves_created_at(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    let updated = store
        .update(
            "Patient",
            created.id(),
            json!({"resourceType": "Patient", "id": created.id(), "name": [{"family": "Smith"}]}),
        )
        .await
        .unwrap();
    assert_eq!(updated.version_id(), 2);
    assert_eq!(updated.created_at(), created.created_at());
}

async fn case_update_rejects_nonexistent_id(store: &Store) {
    let err = store
        .update("Patient", "missing", json!({"resourceType": "Patient", "id": "missing"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

async fn case_update_clears_stale_search_column(store: &Store) {
    let created = store
        .create("Patient", json!({"resourceType": "Patient", "gender": "male"}))
        .await
        .unwrap();
    store
        .update("Patient", created.id(), json!({"resourceType": "Patient", "id": created.id()}))
        .await
        .unwrap();
    let bundle = store
        .search("Patient", &[("gender".to_string(), "male".to_string())], 0)
        .await
        .unwrap();
    assert!(!bundle.entries.iter().any(|e| e.id == created.id()));
}

#[tokio::test]
async fn update_bumps_version_and_preserves_created_at_sqlite() {
    case_update_bumps_version_and_preserves_created_at(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn update_bumps_version_and_preserves_created_at_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_update_bumps_version_and_preserves_created_at(&store).await;
    }
}

#[tokio::test]
async fn update_rejects_nonexistent_id_sqlite() {
    case_update_rejects_nonexistent_id(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn update_rejects_nonexistent_id_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_update_rejects_nonexistent_id(&store).await;
    }
}

#[tokio::test]
async fn update_clears_stale_search_column_sqlite() {
    case_update_clears_stale_search_column(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn update_clears_stale_search_column_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_update_clears_stale_search_column(&store).await;
    }
}
