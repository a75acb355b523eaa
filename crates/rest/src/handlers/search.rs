//! `GET /{Type}?…` — search.
//!
//! `Query<HashMap<String, String>>` collapses repeated query keys to their
//! last value, the same limitation the search handler this is grounded on
//! has; fixing it would mean adding a query-string dependency this crate
//! doesn't otherwise need.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::error::{RestError, RestResult};
use crate::responses::fhir_json;
use crate::state::AppState;

const PAGE_PARAM: &str = "_page";

pub async fn search_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
) -> RestResult<Response> {
    let page = match params.remove(PAGE_PARAM) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| RestError::bad_request(format!("invalid {PAGE_PARAM}: {raw}")))?,
        None => 0,
    };

    let raw_params: Vec<(String, String)> = params.into_iter().collect();
    let bundle = state.store().search(&resource_type, &raw_params, page).await?;
    Ok(fhir_json(StatusCode::OK, bundle.to_json(state.base_url())))
}
