//! The single refresh worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::RefreshQueue;
use crate::error::{MirrorError, MirrorResult};
use crate::repository::RecordRepository;
use crate::upstream::GovernedFetcher;

/// Drains the refresh queue one id at a time.
///
/// Each iteration fetches through the governor, writes the result through the
/// record store, then sleeps the throttle interval whatever the outcome.
/// Failed ids are dropped; they come back when a reader asks for them again.
pub struct RefreshWorker {
    queue: Arc<RefreshQueue>,
    fetcher: GovernedFetcher,
    records: RecordRepository,
    throttle: Duration,
}

/// Running worker. Dropping the handle also stops the worker.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!("Refresh worker panicked: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl RefreshWorker {
    pub fn new(
        queue: Arc<RefreshQueue>,
        fetcher: GovernedFetcher,
        records: RecordRepository,
        throttle: Duration,
    ) -> Self {
        Self {
            queue,
            fetcher,
            records,
            throttle,
        }
    }

    /// Start the worker on the current runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        WorkerHandle { shutdown_tx, join }
    }

    /// Worker loop. Returns when `shutdown` flips to true or its sender is
    /// dropped.
    ///
    /// Shutdown is observed while waiting for an id, during the upstream
    /// fetch (whose result is then discarded) and during the throttle sleep.
    /// A write-through that has started always runs to completion.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Refresh worker started (throttle {}s)",
            self.throttle.as_secs_f64()
        );

        while !*shutdown.borrow() {
            let aid = tokio::select! {
                _ = shutdown.changed() => break,
                next = self.queue.dequeue() => match next {
                    Some(aid) => aid,
                    None => break,
                },
            };

            info!("Refreshing AID {} ({} still queued)", aid, self.queue.depth());

            let fetched = tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown during fetch of AID {}, result discarded", aid);
                    break;
                }
                fetched = self.fetcher.fetch(aid) => fetched,
            };

            match self.store(aid, fetched).await {
                Ok(()) => info!("Cached AID {}", aid),
                Err(MirrorError::CapacityExceeded) => {
                    warn!("Daily API limit reached, dropping AID {}", aid)
                }
                Err(e) if e.is_retryable() => warn!("Failed to refresh AID {}: {}", aid, e),
                Err(e) => error!("Failed to refresh AID {}: {}", aid, e),
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.throttle) => {}
            }
        }

        info!("Refresh worker stopped");
    }

    async fn store(&self, aid: i64, fetched: MirrorResult<String>) -> MirrorResult<()> {
        let body = fetched?;
        self.records.put(aid, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateGovernor;
    use crate::repository::records::tests::{setup, SAMPLE};
    use crate::repository::DbContext;
    use crate::upstream::tests::FakeSource;
    use crate::upstream::AnimeSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    struct Harness {
        ctx: DbContext,
        queue: Arc<RefreshQueue>,
        source: Arc<FakeSource>,
        governor: Arc<RateGovernor>,
    }

    impl Harness {
        fn new(ctx: DbContext, daily_limit: u64) -> Self {
            Self {
                queue: Arc::new(RefreshQueue::new()),
                source: Arc::new(FakeSource::default()),
                governor: Arc::new(RateGovernor::new(
                    ctx.call_log(),
                    daily_limit,
                    Duration::ZERO,
                )),
                ctx,
            }
        }

        fn spawn(&self, throttle: Duration) -> WorkerHandle {
            RefreshWorker::new(
                self.queue.clone(),
                GovernedFetcher::new(self.source.clone(), self.governor.clone()),
                self.ctx.records(),
                throttle,
            )
            .spawn()
        }
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !check().await {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_worker_fetches_and_stores() {
        let (_dir, ctx) = setup().await;
        let harness = Harness::new(ctx, 10);
        harness.source.set(1, SAMPLE);
        let handle = harness.spawn(Duration::from_millis(1));

        harness.queue.enqueue(1);
        let records = &harness.ctx.records();
        wait_until(|| async move { records.get(1).await.unwrap().is_some() }).await;

        handle.shutdown().await;
        assert_eq!(harness.source.calls(), 1);
        assert_eq!(harness.governor.calls_in_window().await.unwrap(), 1);
        assert_eq!(harness.queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_dropped() {
        let (_dir, ctx) = setup().await;
        let harness = Harness::new(ctx, 10);
        harness.source.set(2, SAMPLE);
        let handle = harness.spawn(Duration::from_millis(1));

        // 1 is unknown to the fake, so the call fails.
        harness.queue.enqueue(1);
        harness.queue.enqueue(2);
        let records = &harness.ctx.records();
        wait_until(|| async move { records.get(2).await.unwrap().is_some() }).await;

        handle.shutdown().await;
        assert!(records.get(1).await.unwrap().is_none());
        assert_eq!(harness.source.calls(), 2);
        assert_eq!(harness.governor.calls_in_window().await.unwrap(), 2);
        assert!(!harness.queue.is_pending(1));
    }

    #[tokio::test]
    async fn test_malformed_body_stores_nothing() {
        let (_dir, ctx) = setup().await;
        let harness = Harness::new(ctx, 10);
        harness.source.set(3, "<anime><oops>");
        let handle = harness.spawn(Duration::from_millis(1));

        harness.queue.enqueue(3);
        let source = harness.source.clone();
        wait_until(|| {
            let source = source.clone();
            async move { source.calls() == 1 }
        })
        .await;
        // Let the iteration finish before stopping.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        assert!(harness.ctx.records().get(3).await.unwrap().is_none());
        assert_eq!(harness.ctx.records().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ceiling_stops_calls() {
        let (_dir, ctx) = setup().await;
        let harness = Harness::new(ctx, 1);
        harness.source.set(1, SAMPLE);
        harness.source.set(2, SAMPLE);
        let handle = harness.spawn(Duration::from_millis(1));

        harness.queue.enqueue(1);
        harness.queue.enqueue(2);
        let queue = harness.queue.clone();
        wait_until(|| {
            let queue = queue.clone();
            async move { queue.depth() == 0 }
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        assert_eq!(harness.source.calls(), 1);
        assert!(harness.ctx.records().get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let (_dir, ctx) = setup().await;
        let harness = Harness::new(ctx, 10);
        harness.source.set(1, SAMPLE);
        let handle = harness.spawn(Duration::from_secs(3600));

        harness.queue.enqueue(1);
        let records = &harness.ctx.records();
        wait_until(|| async move { records.get(1).await.unwrap().is_some() }).await;

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("worker should stop while throttling");
    }

    /// Source whose fetch never finishes within a test.
    #[derive(Default)]
    struct StalledSource {
        started: AtomicBool,
    }

    #[async_trait]
    impl AnimeSource for StalledSource {
        async fn fetch(&self, _aid: i64) -> MirrorResult<String> {
            self.started.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(SAMPLE.to_string())
        }
    }

    #[tokio::test]
    async fn test_shutdown_discards_inflight_fetch() {
        let (_dir, ctx) = setup().await;
        let queue = Arc::new(RefreshQueue::new());
        let source = Arc::new(StalledSource::default());
        let governor = Arc::new(RateGovernor::new(ctx.call_log(), 10, Duration::ZERO));
        let handle = RefreshWorker::new(
            queue.clone(),
            GovernedFetcher::new(source.clone(), governor.clone()),
            ctx.records(),
            Duration::from_millis(1),
        )
        .spawn();

        queue.enqueue(1);
        let started = source.clone();
        wait_until(|| {
            let started = started.clone();
            async move { started.started.load(Ordering::SeqCst) }
        })
        .await;

        tokio::time::timeout(Duration::from_secs(3), handle.shutdown())
            .await
            .expect("worker should stop mid-fetch");

        assert!(ctx.records().get(1).await.unwrap().is_none());
        assert_eq!(ctx.records().count().await.unwrap(), 0);
        assert_eq!(governor.calls_in_window().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_while_idle() {
        let (_dir, ctx) = setup().await;
        let harness = Harness::new(ctx, 10);
        let handle = harness.spawn(Duration::from_millis(1));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("idle worker should stop");
    }
}
