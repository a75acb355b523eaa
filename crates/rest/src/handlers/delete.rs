//! `DELETE /{Type}/{id}`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::error::RestResult;
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn delete_handler(
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> RestResult<Response> {
    state.store().delete(&resource_type, &id).await?;
    Ok(fhir_json(
        StatusCode::OK,
        crate::error::operation_outcome("information", "informational", "resource deleted"),
    ))
}
