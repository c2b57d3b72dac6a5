//! Anime document handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::super::AppState;
use super::parse_flag;
use crate::service::Lookup;

#[derive(Debug, Deserialize)]
pub struct AnimeParams {
    pub mature: Option<String>,
}

/// Serve one anime document from cache.
///
/// Responds 200 with the XML (fresh or stale), or 202 when the id has only
/// just been queued.
pub async fn get_anime(
    State(state): State<AppState>,
    Path(aid): Path<i64>,
    Query(params): Query<AnimeParams>,
) -> Response {
    let mature = parse_flag(params.mature.as_deref(), true);

    let lookup = match state.service.lookup(aid, mature).await {
        Ok(lookup) => lookup,
        Err(e) => return e.into_response(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    headers.insert(
        "x-mature-filter",
        HeaderValue::from_static(if mature { "disabled" } else { "enabled" }),
    );

    match lookup {
        Lookup::Fresh { document, age_days } => {
            headers.insert("x-cache", HeaderValue::from_static("HIT"));
            headers.insert("x-age-days", HeaderValue::from(age_days));
            (StatusCode::OK, headers, document).into_response()
        }
        Lookup::Stale { document, age_days } => {
            headers.insert("x-cache", HeaderValue::from_static("STALE"));
            headers.insert("x-status", HeaderValue::from_static("Refreshing"));
            if let Some(age_days) = age_days {
                headers.insert("x-age-days", HeaderValue::from(age_days));
            }
            (StatusCode::OK, headers, document).into_response()
        }
        Lookup::Queued => (
            StatusCode::ACCEPTED,
            axum::Json(serde_json::json!({
                "detail": format!("AID {} queued for fetching. Check back in a few moments.", aid)
            })),
        )
            .into_response(),
    }
}

/// Relations indexed for one anime.
pub async fn get_relations(State(state): State<AppState>, Path(aid): Path<i64>) -> Response {
    match state.service.relations(aid).await {
        Ok(relations) => axum::Json(relations).into_response(),
        Err(e) => e.into_response(),
    }
}
