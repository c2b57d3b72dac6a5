//! AniDB upstream access.
//!
//! [`AnimeSource`] is the raw transport. [`GovernedFetcher`] wraps a source
//! with the daily ceiling, call spacing, call logging and ban detection; it is
//! the only path the refresh worker uses to reach upstream.

mod client;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{MirrorError, MirrorResult};
use crate::rate_limit::RateGovernor;

pub use client::HttpAnimeClient;

/// Case-insensitive marker AniDB puts in the body when a client is banned.
pub const BAN_MARKER: &str = "banned";

/// True when an upstream body is a ban notice rather than a document.
pub fn is_ban_notice(body: &str) -> bool {
    body.to_lowercase().contains(BAN_MARKER)
}

/// Raw document transport.
#[async_trait]
pub trait AnimeSource: Send + Sync {
    /// Body returned for `aid`. Transport and HTTP status failures are
    /// `UpstreamUnavailable`.
    async fn fetch(&self, aid: i64) -> MirrorResult<String>;
}

/// An [`AnimeSource`] behind the rate governor.
#[derive(Clone)]
pub struct GovernedFetcher {
    source: Arc<dyn AnimeSource>,
    governor: Arc<RateGovernor>,
}

impl GovernedFetcher {
    pub fn new(source: Arc<dyn AnimeSource>, governor: Arc<RateGovernor>) -> Self {
        Self { source, governor }
    }

    /// Fetch one document.
    ///
    /// A ceiling refusal makes no call and logs nothing. Every call that is
    /// made is logged, failed ones included.
    pub async fn fetch(&self, aid: i64) -> MirrorResult<String> {
        if !self.governor.allow().await? {
            warn!("Daily API limit reached, not fetching AID {}", aid);
            return Err(MirrorError::CapacityExceeded);
        }

        self.governor.wait_turn().await;
        debug!("Fetching AID {} from upstream", aid);

        let outcome = match self.source.fetch(aid).await {
            Ok(body) if is_ban_notice(&body) => Err(MirrorError::UpstreamBanned),
            other => other,
        };

        if let Err(e) = self.governor.record(aid, outcome.is_ok()).await {
            warn!("Failed to log upstream call for AID {}: {}", aid, e);
        }
        outcome
    }
}
