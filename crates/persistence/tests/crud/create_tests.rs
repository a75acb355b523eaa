//! `POST /{Type}` integration coverage, run against both backends.

use fhir_persistence::engine::{Store, StoreConfig};
use fhir_persistence::error::StoreError;

use crate::common;

async fn case_assigns_version_one_and_server_id(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    assert_eq!(created.version_id(), 1);
    assert!(!created.id().is_empty());
    assert_eq!(created.content()["meta"]["versionId"], "1");
}

async fn case_rejects_duplicate_client_supplied_id(store: &Store) {
    let mut body = common::patient("Doe");
    body["id"] = serde_json::json!("fixed-id");
    store.create("Patient", body.clone()).await.unwrap();
    let err = store.create("Patient", body).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
}

async fn case_indexes_standard_search_columns(store: &Store) {
    let created = store
        .create("Patient", serde_json::json!({"resourceType": "Patient", "gender": "female"}))
        .await
        .unwrap();
    let bundle = store
        .search("Patient", &[("gender".to_string(), "female".to_string())], 0)
        .await
        .unwrap();
    assert!(bundle.entries.iter().any(|e| e.id == created.id()));
}

#[tokio::test]
async fn create_assigns_version_one_and_server_id_sqlite() {
    case_assigns_version_one_and_server_id(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn create_assigns_version_one_and_server_id_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_assigns_version_one_and_server_id(&store).await;
    }
}

#[tokio::test]
async fn create_rejects_duplicate_client_supplied_id_sqlite() {
    let config = StoreConfig { server_generated_ids: false, ..Default::default() };
    case_rejects_duplicate_client_supplied_id(&common::sqlite_store_with(config).await).await;
}

#[tokio::test]
async fn create_rejects_duplicate_client_supplied_id_postgres() {
    let config = StoreConfig { server_generated_ids: false, ..Default::default() };
    if let Some(store) = common::postgres_store_with(config).await {
        case_rejects_duplicate_client_supplied_id(&store).await;
    }
}

#[tokio::test]
async fn create_indexes_standard_search_columns_sqlite() {
    case_indexes_standard_search_columns(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn create_indexes_standard_search_columns_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_indexes_standard_search_columns(&store).await;
    }
}
