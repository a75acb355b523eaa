//! Response shaping shared by every handler.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

/// The content type every FHIR response carries, per the external
/// interface's content-type requirement.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Wraps a JSON body with the `application/fhir+json` content type and the
/// given status, instead of axum's default `application/json`.
pub fn fhir_json(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, FHIR_JSON)], Json(body)).into_response()
}
