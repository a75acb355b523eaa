//! `DELETE /{Type}/{id}` integration coverage, run against both backends.

use fhir_persistence::engine::Store;
use fhir_persistence::error::StoreError;
use fhir_persistence::history::HistoryOperation;

use crate::common;

async fn case_delete_appends_history_and_removes_edges(store: &Store) {
    let patient = store.create("Patient", common::patient("Doe")).await.unwrap();
    let appointment = store
        .create("Appointment", common::appointment_for(patient.id()))
        .await
        .unwrap();
    store.delete("Appointment", appointment.id()).await.unwrap();

    let err = store.read("Appointment", appointment.id()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    let history = store.history_instance("Appointment", appointment.id()).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].operation, HistoryOperation::Delete);
    assert_eq!(history[1].operation, HistoryOperation::Create);

    let bundle = store
        .search("Appointment", &[("patient".to_string(), format!("Patient/{}", patient.id()))], 0)
        .await
        .unwrap();
    assert!(bundle.entries.is_empty());
}

async fn case_delete_rejects_nonexistent_id(store: &Store) {
    let err = store.delete("Patient", "missing").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn delete_appends_history_and_removes_edges_sqlite() {
    case_delete_appends_history_and_removes_edges(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn delete_appends_history_and_removes_edges_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_delete_appends_history_and_removes_edges(&store).await;
    }
}

#[tokio::test]
async fn delete_rejects_nonexistent_id_sqlite() {
    case_delete_rejects_nonexistent_id(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn delete_rejects_nonexistent_id_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_delete_rejects_nonexistent_id(&store).await;
    }
}
