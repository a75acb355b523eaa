//! `POST /{Type}` — create.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::debug;

use crate::error::RestResult;
use crate::responses::fhir_json;
use crate::state::AppState;

pub async fn create_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    Json(body): Json<Value>,
) -> RestResult<Response> {
    let created = state.store().create(&resource_type, body).await?;
    let location = format!("{}/{}/{}", state.base_url(), resource_type, created.id());
    debug!(resource_type = %resource_type, id = %created.id(), "created resource");

    let mut response = fhir_json(StatusCode::CREATED, created.content());
    response.headers_mut().insert(header::LOCATION, location.parse().unwrap());
    Ok(response)
}
