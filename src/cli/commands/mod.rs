//! Command implementations.

pub mod import;
pub mod serve;
pub mod status;

use console::style;

use crate::config::Settings;
use crate::repository::DbContext;

/// Create directories and the schema, reporting progress the same way for
/// every command.
pub(crate) async fn open_database(settings: &Settings) -> anyhow::Result<DbContext> {
    settings.ensure_directories()?;

    println!("{} Preparing database...", style("→").cyan());
    let ctx = settings.create_db_context();
    match ctx.init_schema().await {
        Ok(()) => {
            println!(
                "  {} Database ready at {}",
                style("✓").green(),
                settings.db_path.display()
            );
            Ok(ctx)
        }
        Err(e) => {
            eprintln!("  {} Schema setup failed: {}", style("✗").red(), e);
            Err(anyhow::anyhow!("Database initialization failed: {}", e))
        }
    }
}
