//! Error taxonomy for the mirror core.

use thiserror::Error;

use crate::document::DocumentError;

/// Result alias used across the library.
pub type MirrorResult<T> = Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// Daily upstream call ceiling reached. Retry later.
    #[error("Daily API limit reached. Try again tomorrow.")]
    CapacityExceeded,
    /// Transport or protocol failure talking to upstream.
    #[error("AniDB API error: {0}")]
    UpstreamUnavailable(String),
    /// Upstream answered with a ban notice instead of a document.
    #[error("AniDB API access temporarily banned")]
    UpstreamBanned,
    #[error("Malformed document for AID {aid}: {source}")]
    MalformedDocument {
        aid: i64,
        #[source]
        source: DocumentError,
    },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Invalid AID {0}. Must be a positive integer.")]
    InvalidId(i64),
}

impl MirrorError {
    /// Wrap a parse failure for `aid`.
    pub fn malformed(aid: i64, source: DocumentError) -> Self {
        MirrorError::MalformedDocument { aid, source }
    }

    /// True for conditions the caller should simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MirrorError::CapacityExceeded
                | MirrorError::UpstreamUnavailable(_)
                | MirrorError::UpstreamBanned
        )
    }
}

impl From<diesel::result::Error> for MirrorError {
    fn from(e: diesel::result::Error) -> Self {
        MirrorError::StorageUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for MirrorError {
    fn from(e: std::io::Error) -> Self {
        MirrorError::StorageUnavailable(e.to_string())
    }
}
