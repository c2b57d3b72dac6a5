//! HTTP surface of the mirror.
//!
//! `/stats` is public; every other route requires HTTP Basic credentials.
//! All routes can be nested under a prefix for path-based reverse proxies.

mod auth;
mod errors;
mod handlers;
mod routes;

pub use auth::Credentials;
pub use routes::create_router;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::service::MirrorService;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MirrorService>,
    pub credentials: Arc<Credentials>,
    /// Prefix every route is nested under; empty for none.
    pub root_path: String,
}

impl AppState {
    pub fn new(service: Arc<MirrorService>, settings: &Settings) -> Self {
        Self {
            service,
            credentials: Arc::new(Credentials::new(&settings.api_user, &settings.api_pass)),
            root_path: settings.root_path.clone(),
        }
    }
}

/// Start the web server and run until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
