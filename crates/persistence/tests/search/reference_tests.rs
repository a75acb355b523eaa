//! `reference`-typed search parameter coverage, resolved through the edge table.

use serde_json::json;

use fhir_persistence::engine::Store;

use crate::common;

async fn case_reference_param_resolves_edge(store: &Store) {
    let doe = store.create("Patient", common::patient("Doe")).await.unwrap();
    let smith = store.create("Patient", common::patient("Smith")).await.unwrap();
    let appointment = store.create("Appointment", common::appointment_for(doe.id())).await.unwrap();

    let bundle = store
        .search("Appointment", &[("patient".to_string(), format!("Patient/{}", doe.id()))], 0)
        .await
        .unwrap();
    assert_eq!(bundle.total, 1);
    assert_eq!(bundle.entries[0].id, appointment.id());

    let empty = store
        .search("Appointment", &[("patient".to_string(), format!("Patient/{}", smith.id()))], 0)
        .await
        .unwrap();
    assert!(empty.entries.is_empty());
}

async fn case_reference_param_without_type_prefix_matches_bare_id(store: &Store) {
    let doe = store.create("Patient", common::patient("Doe")).await.unwrap();
    store.create("Appointment", common::appointment_for(doe.id())).await.unwrap();

    let bundle = store.search("Appointment", &[("patient".to_string(), doe.id().to_string())], 0).await.unwrap();
    assert_eq!(bundle.total, 1);
}

#[tokio::test]
async fn reference_param_resolves_edge_sqlite() {
    case_reference_param_resolves_edge(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn reference_param_resolves_edge_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_reference_param_resolves_edge(&store).await;
    }
}

#[tokio::test]
async fn reference_param_without_type_prefix_matches_bare_id_sqlite() {
    case_reference_param_without_type_prefix_matches_bare_id(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn reference_param_without_type_prefix_matches_bare_id_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_reference_param_without_type_prefix_matches_bare_id(&store).await;
    }
}
