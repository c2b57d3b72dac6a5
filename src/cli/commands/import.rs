//! Seed import command.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::open_database;
use crate::config::Settings;
use crate::import::{extract_seed_data, index_cached_documents};

/// Extract the seed archive and index cached documents.
pub async fn cmd_import(settings: &Settings, force: bool, skip_extract: bool) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let store = ctx.documents();

    if !skip_extract {
        println!(
            "{} Looking for seed data in {}",
            style("→").cyan(),
            settings.seed_data_dir.display()
        );
        let extracted = extract_seed_data(store, &settings.seed_data_dir)?;
        if extracted > 0 {
            println!("  {} Extracted {} XML files", style("✓").green(), extracted);
        } else {
            println!("  {} Nothing extracted", style("→").dim());
        }
    }

    let records = ctx.records();
    let existing = records.count().await?;
    if existing > 0 && !force {
        println!(
            "{} {} records already indexed; use --force to re-index",
            style("!").yellow(),
            existing
        );
        return Ok(());
    }

    let total = store.list_documents()?.len();
    if total == 0 {
        println!(
            "{} No XML files in {}",
            style("!").yellow(),
            store.dir().display()
        );
        return Ok(());
    }

    println!("{} Indexing {} documents", style("→").cyan(), total);
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("█▓░"),
    );
    progress.set_message("Indexing...");

    let summary = index_cached_documents(&records, store, &|done, _| {
        progress.set_position(done as u64);
    })
    .await?;
    progress.finish_and_clear();

    println!(
        "  {} Indexed {} of {} documents",
        style("✓").green(),
        summary.indexed,
        summary.total
    );
    if summary.failed > 0 {
        println!(
            "  {} {} documents failed (see log)",
            style("✗").red(),
            summary.failed
        );
    }
    Ok(())
}
