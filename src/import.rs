//! Seed bootstrap: unpack a seed archive into the cache directory and index
//! documents that have no record rows yet.

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::repository::{DbContext, RecordRepository};
use crate::storage::DocumentStore;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Outcome of a bulk index run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: usize,
    pub indexed: usize,
    pub failed: usize,
}

/// First `*.zip` in `seed_dir`, by name.
pub fn find_seed_archive(seed_dir: &Path) -> std::io::Result<Option<PathBuf>> {
    if !seed_dir.is_dir() {
        return Ok(None);
    }
    let mut archives: Vec<PathBuf> = std::fs::read_dir(seed_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        })
        .collect();
    archives.sort();
    Ok(archives.into_iter().next())
}

/// Unpack the seed archive when the cache directory holds no documents.
///
/// Only `.xml` entries are extracted, flattened into the cache directory.
/// Returns the number of files written (0 when skipped).
pub fn extract_seed_data(store: &DocumentStore, seed_dir: &Path) -> Result<usize, ImportError> {
    if store.has_documents() {
        info!("Cache directory already has documents, skipping seed extraction");
        return Ok(0);
    }

    let Some(archive_path) = find_seed_archive(seed_dir)? else {
        warn!("No seed archive found in {}", seed_dir.display());
        return Ok(0);
    };

    info!("Extracting seed data from {}", archive_path.display());
    store.ensure_dir()?;

    let mut archive = ZipArchive::new(File::open(&archive_path)?)?;
    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(file_name) = flattened_name(entry.name()) else {
            continue;
        };
        let mut out = File::create(store.dir().join(file_name))?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    info!("Extracted {} XML files to {}", extracted, store.dir().display());
    Ok(extracted)
}

/// Base name of an archive entry, if it is an XML file safe to write.
fn flattened_name(entry_name: &str) -> Option<String> {
    let base = entry_name.rsplit(['/', '\\']).next()?;
    if base.is_empty() || base.starts_with('.') || !base.to_ascii_lowercase().ends_with(".xml") {
        return None;
    }
    Some(base.to_string())
}

/// Index every cached document file. Failures are logged and counted, not
/// fatal. `on_progress` is called after each file with `(done, total)`.
pub async fn index_cached_documents(
    records: &RecordRepository,
    store: &DocumentStore,
    on_progress: &(dyn Fn(usize, usize) + Send + Sync),
) -> Result<ImportSummary, ImportError> {
    let files = store.list_documents()?;
    let mut summary = ImportSummary {
        total: files.len(),
        ..Default::default()
    };

    for (done, (aid, path)) in files.into_iter().enumerate() {
        let outcome = match std::fs::read_to_string(&path) {
            Ok(text) => records.index_cached(aid, &text).await.map(|_| ()).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(()) => summary.indexed += 1,
            Err(e) => {
                warn!("Error indexing {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
        on_progress(done + 1, summary.total);
    }

    Ok(summary)
}

/// Startup bootstrap: extract seed data, then bulk-index if the record table
/// is empty.
pub async fn bootstrap(db: &DbContext, seed_dir: &Path) -> Result<Option<ImportSummary>, ImportError> {
    let store = db.documents();
    extract_seed_data(store, seed_dir)?;

    let records = db.records();
    if records.count().await? > 0 || !store.has_documents() {
        return Ok(None);
    }

    info!("Record table is empty, indexing cached documents");
    let summary = index_cached_documents(&records, store, &|done, total| {
        if total > 100 && done % 1000 == 0 {
            info!("Indexed {}/{} files", done, total);
        }
    })
    .await?;
    info!(
        "Indexed {} files ({} failed)",
        summary.indexed, summary.failed
    );
    Ok(Some(summary))
}
