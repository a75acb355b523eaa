//! `GET /{Type}/{id}/_history` — instance version history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{json, Value};

use crate::error::RestResult;
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn history_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> RestResult<Response> {
    let versions = state.store().history_instance(&resource_type, &id).await?;
    let base = state.base_url().trim_end_matches('/');

    let entries: Vec<Value> = versions
        .iter()
        .map(|version| {
            json!({
                "fullUrl": format!("{base}/{}/{}/_history/{}", resource_type, id, version.resource.version_id()),
                "resource": version.resource.content(),
                "request": { "method": version.operation.http_method(), "url": format!("{}/{}", resource_type, id) },
                "response": { "status": "200" },
            })
        })
        .collect();

    let bundle = json!({
        "resourceType": "Bundle",
        "type": "history",
        "total": entries.len(),
        "entry": entries,
    });
    Ok(fhir_json(StatusCode::OK, bundle))
}
