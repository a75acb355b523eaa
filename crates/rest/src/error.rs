//! Error types for the FHIR REST API.
//!
//! Every [`StoreError`] variant maps onto exactly one HTTP status code and
//! FHIR `OperationOutcome` issue code, per the table below. The REST layer
//! itself only ever constructs [`RestError::BadRequest`] (malformed query
//! strings, path/body mismatches caught before the body reaches the store).
//!
//! | Storage error | HTTP status | Issue code |
//! |---|---|---|
//! | `NotFound` | 404 | not-found |
//! | `Conflict` | 409 | conflict |
//! | `InvalidInput` | 400 | invalid |
//! | `InvalidReference` | 422 | invalid |
//! | `UnsupportedParameter` | 400 | not-supported |
//! | `Format` | 400 | invalid |
//! | `Internal` | 500 | exception |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fhir_persistence::error::StoreError;

/// Convenience alias for handler return types.
pub type RestResult<T> = Result<T, RestError>;

/// The REST-layer error type. Every `StoreError` a handler receives is
/// converted via [`From`]; the variants here beyond that exist only for
/// failures caught before the storage engine is reached.
#[derive(Debug)]
pub enum RestError {
    /// The body or path failed a REST-layer check (resourceType/id
    /// mismatch, unparseable JSON, wrong content type).
    BadRequest(String),
    /// A storage-engine error, carrying its HTTP status and FHIR issue code.
    Store { status: StatusCode, code: &'static str, message: String },
}

impl RestError {
    /// Shorthand for a malformed-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest(message.into())
    }
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not-found"),
            StoreError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            StoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid"),
            StoreError::InvalidReference { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid"),
            StoreError::UnsupportedParameter(_) => (StatusCode::BAD_REQUEST, "not-supported"),
            StoreError::Format(_) => (StatusCode::BAD_REQUEST, "invalid"),
            StoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "exception"),
        };
        RestError::Store { status, code, message: err.to_string() }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            RestError::BadRequest(message) => (StatusCode::BAD_REQUEST, "invalid", message),
            RestError::Store { status, code, message } => (status, code, message),
        };
        let outcome = operation_outcome("error", code, &message);
        (status, Json(outcome)).into_response()
    }
}

/// Builds a FHIR `OperationOutcome` resource with a single issue.
pub fn operation_outcome(severity: &str, code: &str, details: &str) -> serde_json::Value {
    serde_json::json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": severity,
            "code": code,
            "details": { "text": details },
        }],
    })
}
