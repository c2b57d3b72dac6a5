//! Status command.

use console::style;

use super::open_database;
use crate::config::Settings;
use crate::service::MirrorService;

/// Print cache size and the upstream call budget.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let service = MirrorService::new(ctx, settings);

    let stats = service.stats().await?;
    let tags = service.list_tags().await?;
    let remaining = stats.daily_limit.saturating_sub(stats.api_calls_last_24h);

    println!();
    println!("{}", style("AniDB mirror").bold());
    println!("  Cached anime:      {}", stats.cached_anime);
    println!("  Distinct tags:     {}", tags.len());
    println!(
        "  API calls (24h):   {}/{}",
        stats.api_calls_last_24h, stats.daily_limit
    );
    let remaining_label = if remaining == 0 {
        style(remaining.to_string()).red()
    } else {
        style(remaining.to_string()).green()
    };
    println!("  Calls remaining:   {}", remaining_label);
    println!("  Cache directory:   {}", settings.xml_dir.display());
    Ok(())
}
