//! Tag search and listing handlers.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::super::AppState;
use crate::service::DEFAULT_MIN_WEIGHT;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub tags: String,
    pub min_weight: Option<i32>,
}

/// Anime matching any of a comma-separated tag list.
pub async fn search_tags(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let min_weight = params.min_weight.unwrap_or(DEFAULT_MIN_WEIGHT);
    match state.service.search(&params.tags, min_weight).await {
        Ok(search) => axum::Json(search).into_response(),
        Err(e) => e.into_response(),
    }
}

/// All known tags with usage counts.
pub async fn list_tags(State(state): State<AppState>) -> Response {
    match state.service.list_tags().await {
        Ok(tags) => axum::Json(tags).into_response(),
        Err(e) => e.into_response(),
    }
}
