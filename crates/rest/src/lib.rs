//! FHIR R4 RESTful API surface over `fhir-persistence`.
//!
//! Every resource type's create/read/vread/update/patch/delete/history/
//! search interactions, plus `GET /metadata`, are mounted under the
//! configured base path (`/fhir/r4` by default) by [`create_app`]. The
//! storage and search engine itself lives in `fhir-persistence`; this crate
//! only adapts its [`fhir_persistence::error::StoreError`] results onto HTTP
//! status codes and `OperationOutcome` bodies.

pub mod config;
pub mod error;
pub mod handlers;
pub mod responses;
pub mod routing;
pub mod state;

pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use fhir_persistence::engine::Store;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builds the Axum application, already bootstrapped against `store`.
pub fn create_app(store: Arc<Store>, config: &ServerConfig) -> Router {
    let state = AppState::new(store);

    let router = Router::new().nest("/fhir/r4", routing::fhir_r4_routes()).with_state(state);

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(30)));

    router.layer(CorsLayer::new().allow_origin(Any)).layer(service_builder)
}

/// Initializes the tracing subscriber for logging. Call once at startup.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("fhir_rest={level},tower_http=info")));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
