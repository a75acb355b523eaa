//! `GET /{Type}/{id}` integration coverage, run against both backends.

use fhir_persistence::engine::Store;
use fhir_persistence::error::StoreError;

use crate::common;

async fn case_read_after_write_returns_written_content(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    let read_back = store.read("Patient", created.id()).await.unwrap();
    assert_eq!(read_back.content()["name"][0]["family"], "Doe");
    assert_eq!(read_back.version_id(), 1);
}

async fn case_read_missing_is_not_found(store: &Store) {
    let err = store.read("Patient", "does-not-exist").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

async fn case_read_after_delete_is_not_found(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    store.delete("Patient", created.id()).await.unwrap();
    let err = store.read("Patient", created.id()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn read_after_write_returns_written_content_sqlite() {
    case_read_after_write_returns_written_content(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn read_after_write_returns_written_content_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_read_after_write_returns_written_content(&store).await;
    }
}

#[tokio::test]
async fn read_missing_is_not_found_sqlite() {
    case_read_missing_is_not_found(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn read_missing_is_not_found_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_read_missing_is_not_found(&store).await;
    }
}

#[tokio::test]
async fn read_after_delete_is_not_found_sqlite() {
    case_read_after_delete_is_not_found(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn read_after_delete_is_not_found_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_read_after_delete_is_not_found(&store).await;
    }
}
