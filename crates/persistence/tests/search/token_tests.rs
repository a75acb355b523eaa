//! `token`-typed search parameter coverage (`gender` on Patient, `status` on Appointment).

use serde_json::json;

use fhir_persistence::engine::Store;

use crate::common;

async fn case_token_param_exact_match(store: &Store) {
    store.create("Patient", json!({"resourceType": "Patient", "gender": "female"})).await.unwrap();
    store.create("Patient", json!({"resourceType": "Patient", "gender": "male"})).await.unwrap();

    let bundle = store.search("Patient", &[("gender".to_string(), "female".to_string())], 0).await.unwrap();
    assert_eq!(bundle.total, 1);
    assert_eq!(bundle.entries[0].content["gender"], "female");
}

async fn case_token_param_on_appointment_status(store: &Store) {
    let patient = store.create("Patient", common::patient("Doe")).await.unwrap();
    store.create("Appointment", common::appointment_for(patient.id())).await.unwrap();
    store
        .create(
            "Appointment",
            json!({
                "resourceType": "Appointment",
                "status": "cancelled",
                "participant": [{"actor": {"reference": format!("Patient/{}", patient.id())}}],
            }),
        )
        .await
        .unwrap();

    let bundle = store.search("Appointment", &[("status".to_string(), "cancelled".to_string())], 0).await.unwrap();
    assert_eq!(bundle.total, 1);
    assert_eq!(bundle.entries[0].content["status"], "cancelled");
}

#[tokio::test]
async fn token_param_exact_match_sqlite() {
    case_token_param_exact_match(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn token_param_exact_match_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_token_param_exact_match(&store).await;
    }
}

#[tokio::test]
async fn token_param_on_appointment_status_sqlite() {
    case_token_param_on_appointment_status(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn token_param_on_appointment_status_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_token_param_on_appointment_status(&store).await;
    }
}
