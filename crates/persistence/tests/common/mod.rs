//! Shared fixtures and store helpers for the integration suite.

use std::sync::Arc;

use serde_json::{json, Value};

use fhir_persistence::backends::sqlite::SqliteBackend;
use fhir_persistence::engine::{Store, StoreConfig};

#[cfg(feature = "postgres")]
use fhir_persistence::backends::postgres::{PostgresBackend, PostgresBackendConfig};

/// A fresh in-memory SQLite store, schema bootstrapped and catalog seeded.
pub async fn sqlite_store() -> Store {
    sqlite_store_with(StoreConfig::default()).await
}

/// Like [`sqlite_store`], with a caller-supplied configuration — used by
/// tests that need client-supplied ids (`server_generated_ids: false`).
pub async fn sqlite_store_with(config: StoreConfig) -> Store {
    let backend = Arc::new(SqliteBackend::in_memory().expect("open in-memory sqlite"));
    let store = Store::new(backend, config);
    store.bootstrap().await.expect("bootstrap sqlite store");
    store
}

/// A PostgreSQL-backed store built from `FHIR_TEST_POSTGRES_*` environment
/// variables, or `None` when `FHIR_TEST_POSTGRES_HOST` isn't set. These
/// tests need a real server and are skipped rather than failed when one
/// isn't reachable, so CI without a live postgres instance stays green.
#[cfg(feature = "postgres")]
pub async fn postgres_store() -> Option<Store> {
    postgres_store_with(StoreConfig::default()).await
}

/// Like [`postgres_store`], with a caller-supplied [`StoreConfig`].
#[cfg(feature = "postgres")]
pub async fn postgres_store_with(config: StoreConfig) -> Option<Store> {
    let host = std::env::var("FHIR_TEST_POSTGRES_HOST").ok()?;
    let pg_config = PostgresBackendConfig {
        host,
        port: std::env::var("FHIR_TEST_POSTGRES_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
        dbname: std::env::var("FHIR_TEST_POSTGRES_DB").unwrap_or_else(|_| "fhirserv_test".to_string()),
        user: std::env::var("FHIR_TEST_POSTGRES_USER").unwrap_or_else(|_| "fhirserv".to_string()),
        password: std::env::var("FHIR_TEST_POSTGRES_PASSWORD").ok(),
        ..Default::default()
    };
    let backend = Arc::new(PostgresBackend::connect(pg_config).expect("connect to postgres"));
    let store = Store::new(backend, config);
    store.bootstrap().await.expect("bootstrap postgres store");
    Some(store)
}

#[cfg(not(feature = "postgres"))]
pub async fn postgres_store() -> Option<Store> {
    None
}

#[cfg(not(feature = "postgres"))]
pub async fn postgres_store_with(_config: StoreConfig) -> Option<Store> {
    None
}

pub fn patient(family: &str) -> Value {
    json!({"resourceType": "Patient", "name": [{"family": family}]})
}

pub fn appointment_for(patient_id: &str) -> Value {
    json!({
        "resourceType": "Appointment",
        "status": "booked",
        "participant": [{"actor": {"reference": format!("Patient/{patient_id}")}}],
    })
}
