//! Sanity coverage for the ordinary commit path — no failure injected, so
//! every step in `create`/`update`/`delete`'s internal transaction context
//! should run through to `ctx.commit()` and leave nothing to undo.

use serde_json::json;

use fhir_persistence::engine::Store;

use crate::common;

async fn case_successful_create_leaves_history_and_edges_consistent(store: &Store) {
    let patient = store.create("Patient", common::patient("Doe")).await.unwrap();
    let appointment = store.create("Appointment", common::appointment_for(patient.id())).await.unwrap();

    let history = store.history_instance("Appointment", appointment.id()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].resource.version_id(), 1);

    let edges = store
        .search("Appointment", &[("patient".to_string(), format!("Patient/{}", patient.id()))], 0)
        .await
        .unwrap();
    assert_eq!(edges.total, 1);
}

async fn case_successful_update_leaves_exactly_two_history_entries(store: &Store) {
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
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn successful_create_leaves_history_and_edges_consistent_sqlite() {
    case_successful_create_leaves_history_and_edges_consistent(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn successful_create_leaves_history_and_edges_consistent_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_successful_create_leaves_history_and_edges_consistent(&store).await;
    }
}

#[tokio::test]
async fn successful_update_leaves_exactly_two_history_entries_sqlite() {
    case_successful_update_leaves_exactly_two_history_entries(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn successful_update_leaves_exactly_two_history_entries_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_successful_update_leaves_exactly_two_history_entries(&store).await;
    }
}
