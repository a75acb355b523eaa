//! `GET /{Type}/{id}/_history/{vid}` integration coverage.

use serde_json::json;

use fhir_persistence::engine::Store;
use fhir_persistence::error::StoreError;

use crate::common;

async fn case_vread_fetches_prior_version_content(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    store
        .update(
            "Patient",
            created.id(),
            json!({"resourceType": "Patient", "id": created.id(), "name": [{"family": "Roe"}]}),
        )
        .await
        .unwrap();

    let v1 = store.vread("Patient", created.id(), 1).await.unwrap();
    assert_eq!(v1.content()["name"][0]["family"], "Doe");

    let v2 = store.vread("Patient", created.id(), 2).await.unwrap();
    assert_eq!(v2.content()["name"][0]["family"], "Roe");
}

async fn case_vread_unknown_version_is_not_found(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    let err = store.vread("Patient", created.id(), 99).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

async fn case_vread_survives_delete(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    store.delete("Patient", created.id()).await.unwrap();

    let v1 = store.vread("Patient", created.id(), 1).await.unwrap();
    assert_eq!(v1.content()["name"][0]["family"], "Doe");
}

#[tokio::test]
async fn vread_fetches_prior_version_content_sqlite() {
    case_vread_fetches_prior_version_content(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn vread_fetches_prior_version_content_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_vread_fetches_prior_version_content(&store).await;
    }
}

#[tokio::test]
async fn vread_unknown_version_is_not_found_sqlite() {
    case_vread_unknown_version_is_not_found(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn vread_unknown_version_is_not_found_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_vread_unknown_version_is_not_found(&store).await;
    }
}

#[tokio::test]
async fn vread_survives_delete_sqlite() {
    case_vread_survives_delete(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn vread_survives_delete_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_vread_survives_delete(&store).await;
    }
}
