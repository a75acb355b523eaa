//! `GET /metadata` — capabilities.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use crate::error::RestResult;
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn capabilities_handler(State(state): State<AppState>) -> RestResult<Response> {
    let resource_types = state.store().known_resource_types().await?;
    let resources: Vec<_> = resource_types.iter().map(|rt| resource_capability(rt)).collect();

    let statement = json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "kind": "instance",
        "fhirVersion": "4.0.1",
        "format": ["json", "application/fhir+json"],
        "implementation": { "url": state.base_url() },
        "rest": [{
            "mode": "server",
            "resource": resources,
        }],
    });
    Ok(fhir_json(StatusCode::OK, statement))
}

fn resource_capability(resource_type: &str) -> serde_json::Value {
    json!({
        "type": resource_type,
        "interaction": [
            { "code": "read" },
            { "code": "vread" },
            { "code": "update" },
            { "code": "patch" },
            { "code": "delete" },
            { "code": "history-instance" },
            { "code": "create" },
            { "code": "search-type" },
        ],
        "versioning": "versioned",
        "readHistory": true,
    })
}
