//! Daily call ceiling plus minimum inter-call spacing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::MirrorResult;
use crate::repository::CallLogRepository;

/// Length of the trailing call window.
pub const CALL_WINDOW_HOURS: i64 = 24;

/// Decides whether another upstream call may be made.
///
/// `allow` followed by the call is check-then-act; it is only exact with a
/// single caller, which the refresh worker guarantees.
#[derive(Debug)]
pub struct RateGovernor {
    log: CallLogRepository,
    daily_limit: u64,
    min_call_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGovernor {
    pub fn new(log: CallLogRepository, daily_limit: u64, min_call_delay: Duration) -> Self {
        Self {
            log,
            daily_limit,
            min_call_delay,
            last_call: Mutex::new(None),
        }
    }

    pub fn daily_limit(&self) -> u64 {
        self.daily_limit
    }

    /// Calls logged in the trailing window ending now.
    pub async fn calls_in_window(&self) -> MirrorResult<u64> {
        self.calls_in_window_at(Utc::now()).await
    }

    pub async fn calls_in_window_at(&self, now: DateTime<Utc>) -> MirrorResult<u64> {
        let since = now - chrono::Duration::hours(CALL_WINDOW_HOURS);
        Ok(self.log.count_since(since).await?)
    }

    /// True when another call fits under the daily ceiling.
    pub async fn allow(&self) -> MirrorResult<bool> {
        self.allow_at(Utc::now()).await
    }

    pub async fn allow_at(&self, now: DateTime<Utc>) -> MirrorResult<bool> {
        let used = self.calls_in_window_at(now).await?;
        debug!("Upstream calls in window: {}/{}", used, self.daily_limit);
        Ok(used < self.daily_limit)
    }

    /// Log a completed call, successful or not.
    pub async fn record(&self, aid: i64, success: bool) -> MirrorResult<()> {
        self.record_at(aid, success, Utc::now()).await
    }

    pub async fn record_at(&self, aid: i64, success: bool, at: DateTime<Utc>) -> MirrorResult<()> {
        Ok(self.log.insert(Some(aid), success, at).await?)
    }

    /// Time left before the minimum delay since the previous call has passed.
    pub fn time_until_ready(&self) -> Duration {
        let last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) => self.min_call_delay.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait out the minimum delay, then claim the next call slot.
    pub async fn wait_turn(&self) {
        let wait = {
            let mut last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let wait = match *last {
                Some(at) => self.min_call_delay.saturating_sub(now.duration_since(at)),
                None => Duration::ZERO,
            };
            *last = Some(now + wait);
            wait
        };

        if wait > Duration::ZERO {
            debug!("Spacing upstream calls: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::records::tests::setup;

    #[tokio::test]
    async fn test_refuses_at_ceiling() {
        let (_dir, ctx) = setup().await;
        let governor = RateGovernor::new(ctx.call_log(), 3, Duration::ZERO);
        let now = Utc::now();

        for aid in 1..=2 {
            governor.record_at(aid, true, now).await.unwrap();
        }
        assert!(governor.allow_at(now).await.unwrap());

        // Failed calls count too.
        governor.record_at(3, false, now).await.unwrap();
        assert!(!governor.allow_at(now).await.unwrap());
        assert_eq!(governor.calls_in_window_at(now).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_window_rolls() {
        let (_dir, ctx) = setup().await;
        let governor = RateGovernor::new(ctx.call_log(), 2, Duration::ZERO);
        let start = Utc::now() - chrono::Duration::hours(30);

        governor.record_at(1, true, start).await.unwrap();
        governor.record_at(2, true, start).await.unwrap();
        assert!(!governor.allow_at(start).await.unwrap());

        let later = start + chrono::Duration::hours(CALL_WINDOW_HOURS) + chrono::Duration::seconds(1);
        assert!(governor.allow_at(later).await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_turn_spaces_calls() {
        let (_dir, ctx) = setup().await;
        let governor = RateGovernor::new(ctx.call_log(), 10, Duration::from_millis(50));

        assert_eq!(governor.time_until_ready(), Duration::ZERO);
        let started = Instant::now();
        governor.wait_turn().await;
        governor.wait_turn().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(governor.time_until_ready() > Duration::ZERO);
    }
}
