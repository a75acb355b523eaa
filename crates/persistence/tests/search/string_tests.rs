//! `string`-typed search parameter coverage (`name`/`given` on Patient).

use serde_json::json;

use fhir_persistence::engine::Store;

use crate::common;

async fn case_string_param_prefix_matches(store: &Store) {
    store.create("Patient", json!({"resourceType": "Patient", "name": [{"family": "Donaldson"}]})).await.unwrap();
    store.create("Patient", json!({"resourceType": "Patient", "name": [{"family": "Smith"}]})).await.unwrap();

    let bundle = store.search("Patient", &[("name".to_string(), "Don".to_string())], 0).await.unwrap();
    assert_eq!(bundle.total, 1);
    assert_eq!(bundle.entries[0].content["name"][0]["family"], "Donaldson");
}

async fn case_string_param_no_match_returns_empty(store: &Store) {
    store.create("Patient", json!({"resourceType": "Patient", "name": [{"family": "Smith"}]})).await.unwrap();
    let bundle = store.search("Patient", &[("name".to_string(), "Zzz".to_string())], 0).await.unwrap();
    assert_eq!(bundle.total, 0);
}

#[tokio::test]
async fn string_param_prefix_matches_sqlite() {
    case_string_param_prefix_matches(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn string_param_prefix_matches_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_string_param_prefix_matches(&store).await;
    }
}

#[tokio::test]
async fn string_param_no_match_returns_empty_sqlite() {
    case_string_param_no_match_returns_empty(&common::sqlite_store().await).await;
}

#[tokio::test]
async fn string_param_no_match_returns_empty_postgres() {
    if let Some(store) = common::postgres_store().await {
        case_string_param_no_match_returns_empty(&store).await;
    }
}
