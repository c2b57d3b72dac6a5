//! Query façade over the record store, index, governor and refresh queue.
//!
//! Readers never wait on upstream: a lookup returns whatever is cached and
//! leaves refreshing to the background worker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::document::filter_mature_content;
use crate::error::{MirrorError, MirrorResult};
use crate::rate_limit::RateGovernor;
use crate::refresh::{RefreshQueue, RefreshWorker, WorkerHandle};
use crate::repository::{
    DbContext, IndexRepository, RecordRepository, RelationEntry, TagMatch, TagSummary,
};
use crate::upstream::{AnimeSource, GovernedFetcher};

/// Tag search threshold used when the caller gives none.
pub const DEFAULT_MIN_WEIGHT: i32 = 200;

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Cached and younger than the freshness threshold.
    Fresh { document: String, age_days: i64 },
    /// Cached but old, or cached without a record row. A refresh is queued.
    Stale {
        document: String,
        age_days: Option<i64>,
    },
    /// Nothing cached yet. A fetch is queued.
    Queued,
}

/// Tag search response.
#[derive(Debug, Clone, Serialize)]
pub struct TagSearch {
    pub query: Vec<String>,
    pub min_weight: i32,
    pub results: Vec<TagMatch>,
}

/// Service health and budget snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub status: &'static str,
    pub cached_anime: u64,
    pub api_calls_last_24h: u64,
    pub queue_size: usize,
    pub daily_limit: u64,
}

/// Shared service context handed to every request handler.
pub struct MirrorService {
    db: DbContext,
    records: RecordRepository,
    index: IndexRepository,
    governor: Arc<RateGovernor>,
    queue: Arc<RefreshQueue>,
    update_threshold_days: i64,
    throttle: Duration,
}

impl MirrorService {
    pub fn new(db: DbContext, settings: &Settings) -> Self {
        let governor = RateGovernor::new(
            db.call_log(),
            settings.daily_limit,
            settings.min_call_delay,
        );
        Self {
            records: db.records(),
            index: db.index(),
            governor: Arc::new(governor),
            queue: Arc::new(RefreshQueue::new()),
            update_threshold_days: settings.update_threshold_days,
            throttle: settings.throttle,
            db,
        }
    }

    pub fn db(&self) -> &DbContext {
        &self.db
    }

    pub fn queue(&self) -> &Arc<RefreshQueue> {
        &self.queue
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Spawn the refresh worker. Call once per process.
    pub fn start_worker(&self, source: Arc<dyn AnimeSource>) -> WorkerHandle {
        RefreshWorker::new(
            self.queue.clone(),
            GovernedFetcher::new(source, self.governor.clone()),
            self.records.clone(),
            self.throttle,
        )
        .spawn()
    }

    /// Serve `aid` from cache, queueing a refresh when it is missing or old.
    ///
    /// With `mature == false` the returned document has adult tags and
    /// categories removed; the stored copy is never changed.
    pub async fn lookup(&self, aid: i64, mature: bool) -> MirrorResult<Lookup> {
        if aid <= 0 {
            return Err(MirrorError::InvalidId(aid));
        }

        let Some(record) = self.records.get(aid).await? else {
            if self.queue.enqueue(aid) {
                debug!("AID {} not cached, queued", aid);
            }
            return Ok(Lookup::Queued);
        };

        let now = Utc::now();
        let age_days = record.age_days(now);
        let fresh = record.is_fresh(now, self.update_threshold_days);
        let document = render(aid, record.document, mature);

        match (fresh, age_days) {
            (true, Some(age_days)) => Ok(Lookup::Fresh { document, age_days }),
            _ => {
                if self.queue.enqueue(aid) {
                    debug!("AID {} stale, queued for refresh", aid);
                }
                Ok(Lookup::Stale { document, age_days })
            }
        }
    }

    /// Search by a comma-separated tag list.
    pub async fn search(&self, tags_csv: &str, min_weight: i32) -> MirrorResult<TagSearch> {
        let query = parse_tag_list(tags_csv);
        let results = self.index.query_by_tags(&query, min_weight).await?;
        Ok(TagSearch {
            query,
            min_weight,
            results,
        })
    }

    pub async fn list_tags(&self) -> MirrorResult<Vec<TagSummary>> {
        Ok(self.index.list_tags().await?)
    }

    pub async fn relations(&self, aid: i64) -> MirrorResult<Vec<RelationEntry>> {
        if aid <= 0 {
            return Err(MirrorError::InvalidId(aid));
        }
        Ok(self.index.relations(aid).await?)
    }

    pub async fn stats(&self) -> MirrorResult<Stats> {
        Ok(Stats {
            status: "online",
            cached_anime: self.records.count().await?,
            api_calls_last_24h: self.governor.calls_in_window().await?,
            queue_size: self.queue.depth(),
            daily_limit: self.governor.daily_limit(),
        })
    }
}

/// Split on commas, trim, lowercase, drop empties.
pub fn parse_tag_list(tags_csv: &str) -> Vec<String> {
    tags_csv
        .split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn render(aid: i64, document: String, mature: bool) -> String {
    if mature {
        return document;
    }
    match filter_mature_content(&document) {
        Ok(filtered) => filtered,
        Err(e) => {
            warn!("Mature filter failed for AID {}, serving unfiltered: {}", aid, e);
            document
        }
    }
}
