//! Document files on disk.
//!
//! Each record's document lives in the cache directory as `{aid}.xml`. Files
//! named `AnimeDoc_{aid}.xml` (the layout of older seed archives) resolve to
//! the same id; the canonical name wins when both exist.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Prefix used by legacy seed file names.
const LEGACY_PREFIX: &str = "AnimeDoc_";

/// Suffix of in-flight writes; never picked up as a document.
const TEMP_SUFFIX: &str = ".tmp";

/// Canonical document path for `aid`.
pub fn document_path(dir: &Path, aid: i64) -> PathBuf {
    dir.join(format!("{aid}.xml"))
}

/// Legacy document path for `aid`.
pub fn legacy_document_path(dir: &Path, aid: i64) -> PathBuf {
    dir.join(format!("{LEGACY_PREFIX}{aid}.xml"))
}

/// Extract the id from a document file name in either naming form.
pub fn parse_document_name(file_name: &str) -> Option<i64> {
    let stem = file_name.strip_suffix(".xml")?;
    let stem = stem.strip_prefix(LEGACY_PREFIX).unwrap_or(stem);
    stem.parse::<i64>().ok().filter(|aid| *aid > 0)
}

/// Cache directory holding one XML file per record.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if needed.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Read the cached document for `aid`.
    pub fn read(&self, aid: i64) -> std::io::Result<Option<String>> {
        for path in [
            document_path(&self.dir, aid),
            legacy_document_path(&self.dir, aid),
        ] {
            match std::fs::read_to_string(&path) {
                Ok(text) => return Ok(Some(text)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Stage `text` next to the canonical path. Nothing is visible to readers
    /// until [`DocumentStore::commit`].
    pub fn write_temp(&self, aid: i64, text: &str) -> std::io::Result<PathBuf> {
        self.ensure_dir()?;
        let tmp = self.dir.join(format!("{aid}.xml{TEMP_SUFFIX}"));
        std::fs::write(&tmp, text)?;
        Ok(tmp)
    }

    /// Atomically move a staged file into place.
    pub fn commit(&self, tmp: &Path, aid: i64) -> std::io::Result<PathBuf> {
        let path = document_path(&self.dir, aid);
        std::fs::rename(tmp, &path)?;
        Ok(path)
    }

    /// Drop a staged file after a failed write. Missing files are ignored.
    pub fn discard(&self, tmp: &Path) {
        if let Err(e) = std::fs::remove_file(tmp) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove staged file {}: {}", tmp.display(), e);
            }
        }
    }

    /// True when the directory holds at least one `.xml` file.
    pub fn has_documents(&self) -> bool {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries.filter_map(Result::ok).any(|entry| {
                    entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
                })
            })
            .unwrap_or(false)
    }

    /// Every document file with its id, sorted by id. When both names exist
    /// for one id only the canonical file is listed.
    pub fn list_documents(&self) -> std::io::Result<Vec<(i64, PathBuf)>> {
        let mut found: Vec<(i64, bool, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(aid) = parse_document_name(name) {
                found.push((aid, name.starts_with(LEGACY_PREFIX), entry.path()));
            }
        }
        // Canonical (false) sorts before legacy (true) for the same id.
        found.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        found.dedup_by_key(|(aid, _, _)| *aid);
        Ok(found.into_iter().map(|(aid, _, path)| (aid, path)).collect())
    }
}
