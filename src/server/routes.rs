//! Router configuration for the web server.

use axum::{middleware, routing::get, Router};
use tower_http::cors::CorsLayer;

use super::auth;
use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/anime/:aid", get(handlers::get_anime))
        .route("/anime/:aid/relations", get(handlers::get_relations))
        .route("/search/tags", get(handlers::search_tags))
        .route("/tags", get(handlers::list_tags))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));

    let routes = Router::new()
        // Health check, no auth
        .route("/stats", get(handlers::get_stats))
        .merge(protected);

    let app = if state.root_path.is_empty() {
        routes
    } else {
        Router::new().nest(&state.root_path, routes)
    };

    app.layer(CorsLayer::permissive()).with_state(state)
}
