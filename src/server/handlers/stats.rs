//! Health and budget endpoint.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};

use super::super::AppState;

pub async fn get_stats(State(state): State<AppState>) -> Response {
    match state.service.stats().await {
        Ok(stats) => axum::Json(stats).into_response(),
        Err(e) => e.into_response(),
    }
}
