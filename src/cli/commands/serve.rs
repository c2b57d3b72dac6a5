//! Web server command.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use console::style;

use super::open_database;
use crate::config::Settings;
use crate::import;
use crate::server::{self, AppState};
use crate::service::MirrorService;
use crate::upstream::HttpAnimeClient;

/// Start the web server and the refresh worker.
pub async fn cmd_serve(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;

    if let Some(summary) = import::bootstrap(&ctx, &settings.seed_data_dir).await? {
        println!(
            "  {} Indexed {} seed files ({} failed)",
            style("✓").green(),
            summary.indexed,
            summary.failed
        );
    }

    let service = Arc::new(MirrorService::new(ctx, settings));
    let client = HttpAnimeClient::new(settings.upstream.clone())?;
    let worker = service.start_worker(Arc::new(client));

    println!(
        "{} Starting AniDB mirror at http://{}{}",
        style("→").cyan(),
        settings.bind,
        settings.root_path
    );
    println!(
        "  Daily limit {}, refresh after {} days",
        settings.daily_limit, settings.update_threshold_days
    );
    println!("  Press Ctrl+C to stop");

    let state = AppState::new(service, settings);
    let result = server::serve(state, settings.bind, shutdown_signal()).await;

    println!("{} Shutting down...", style("→").cyan());
    worker.shutdown().await;
    result
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Parse a bind address that can be:
/// - Just a port: "8000" -> 0.0.0.0:8000
/// - Host and port: "127.0.0.1:8000" or "localhost:8000"
pub fn parse_bind_address(bind: &str) -> anyhow::Result<SocketAddr> {
    let bind = bind.trim();
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    if let Ok(addr) = bind.parse::<SocketAddr>() {
        return Ok(addr);
    }
    bind.to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Could not resolve bind address {}", bind))
}
