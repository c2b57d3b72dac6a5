//! Command-line interface.
//!
//! Every setting can come from its environment variable or a flag; the flag
//! wins.

mod commands;

use clap::{Parser, Subcommand};

use crate::config::{Settings, SettingsArgs};

#[derive(Parser)]
#[command(name = "anidb-mirror")]
#[command(about = "Caching mirror for the AniDB HTTP API")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and the background refresh worker
    Serve {
        /// Listen address: a port, or host:port
        #[arg(short, long, env = "BIND", default_value = "0.0.0.0:8000")]
        bind: String,
    },

    /// Extract seed data and index cached documents
    Import {
        /// Index even when records already exist
        #[arg(short, long)]
        force: bool,
        /// Do not look for a seed archive
        #[arg(long)]
        skip_extract: bool,
    },

    /// Show cache size and upstream call budget
    Status,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from(cli.settings);

    match cli.command {
        Commands::Serve { bind } => {
            settings.bind = commands::serve::parse_bind_address(&bind)?;
            commands::serve::cmd_serve(&settings).await
        }
        Commands::Import {
            force,
            skip_extract,
        } => commands::import::cmd_import(&settings, force, skip_extract).await,
        Commands::Status => commands::status::cmd_status(&settings).await,
    }
}
