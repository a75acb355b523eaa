//! `PATCH /{Type}/{id}` — merge-patch or JSON Patch (RFC 6902).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use fhir_persistence::engine::PatchInput;

use crate::error::RestResult;
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn patch_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> RestResult<Response> {
    let input = PatchInput::from_body(body)?;
    let patched = state.store().patch(&resource_type, &id, input).await?;
    Ok(fhir_json(StatusCode::OK, patched.content()))
}
