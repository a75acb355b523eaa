//! `GET /{Type}/{id}/_history/{vid}` — read a specific version.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::error::{RestError, RestResult};
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn vread_handler(
    State(state): State<AppState>,
    Path((resource_type, id, vid)): Path<(String, String, String)>,
) -> RestResult<Response> {
    let version_id: u64 = vid
        .parse()
        .map_err(|_| RestError::bad_request(format!("invalid version id: {vid}")))?;
    let resource = state.store().vread(&resource_type, &id, version_id).await?;
    Ok(fhir_json(StatusCode::OK, resource.content()))
}
