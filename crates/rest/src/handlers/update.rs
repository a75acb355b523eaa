//! `PUT /{Type}/{id}` — full replace, no upsert.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use crate::error::RestResult;
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn update_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> RestResult<Response> {
    let updated = state.store().update(&resource_type, &id, body).await?;
    Ok(fhir_json(StatusCode::OK, updated.content()))
}
