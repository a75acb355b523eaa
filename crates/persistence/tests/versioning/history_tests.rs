//! `GET /{Type}/{id}/_history` integration coverage.

use serde_json::json;

use fhir_persistence::engine::Store;
use fhir_persistence::history::HistoryOperation;

use crate::common;

async fn case_history_lists_versions_newest_first(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    store
        .update(
            "Patient",
            created.id(),
            json!({"resourceType": "Patient", "id": created.id(), "name": [{"family": "Roe"}]}),
        )
        .await
        .unwrap();
    store.delete("Patient", created.id()).await.unwrap();

    let history = store.history_instance("Patient", created.id()).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].operation, HistoryOperation::Delete);
    assert_eq!(history[0].resource.version_id(), 3);
    assert_eq!(history[1].operation, HistoryOperation::Update);
    assert_eq!(history[1].resource.version_id(), 2);
    assert_eq!(history[2].operation, HistoryOperation::Create);
    assert_eq!(history[2].resource.version_id(), 1);
}

async fn case_history_reflects_each_snapshot_content(store: &Store) {
    let created = store.create("Patient", common::patient("Doe")).await.unwrap();
    store
        .update(
            "Patient",
            created.id(),
            json!({"resourceType": "Patient", "id": created.id(), "name": [{"family": "Roe"}]}),
        )
        .await
        .unwrap();

    let history = store.history_instance("Patient", created.id()).await.unwrap();
    assert_eq!(history[0].resource.content()["name"][0]["family"], "Roe");
    assert_eq!(history[1].resource.content()["name"][0]["family"], "Doe");
}

#[tokio::test]
async fn history_lists_versions_newest_first_sqlite() {
    case_history_lists_versions_newest_first(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn history_lists_versions_newest_first_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_history_lists_versions_newest_first(&store).await;
    }
}

#[tokio::test]
async fn history_reflects_each_snapshot_content_sqlite() {
    case_history_reflects_each_snapshot_content(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn history_reflects_each_snapshot_content_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_history_reflects_each_snapshot_content(&store).await;
    }
}
