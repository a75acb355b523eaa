//! Route table: every FHIR interaction, mounted under the `/fhir/r4` base
//! path.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Builds the `/fhir/r4` route table.
pub fn fhir_r4_routes() -> Router<AppState> {
    Router::new()
        .route("/metadata", get(handlers::capabilities_handler))
        .route("/{resource_type}", post(handlers::create_handler).get(handlers::search_handler))
        .route(
            "/{resource_type}/{id}",
            get(handlers::read_handler)
                .put(handlers::update_handler)
                .patch(handlers::patch_handler)
                .delete(handlers::delete_handler),
        )
        .route("/{resource_type}/{id}/_history", get(handlers::history_handler))
        .route("/{resource_type}/{id}/_history/{vid}", get(handlers::vread_handler))
}
