//! FIFO of ids awaiting refresh.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Unbounded FIFO that holds each id at most once.
///
/// An id is pending from `enqueue` until it is handed out by `dequeue`.
/// Enqueuing it again while it is being processed queues it a second time.
#[derive(Debug)]
pub struct RefreshQueue {
    tx: mpsc::UnboundedSender<i64>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<i64>>,
    pending: Mutex<HashSet<i64>>,
}

impl Default for RefreshQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Queue `aid` unless it is already pending. Returns true if it was added.
    pub fn enqueue(&self, aid: i64) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.insert(aid) {
            return false;
        }
        if self.tx.send(aid).is_err() {
            pending.remove(&aid);
            return false;
        }
        true
    }

    /// Wait for the next id and clear its pending mark.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    /// Returns `None` only if the channel has closed.
    pub async fn dequeue(&self) -> Option<i64> {
        let mut rx = self.rx.lock().await;
        let aid = rx.recv().await?;
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&aid);
        Some(aid)
    }

    /// Ids queued and not yet dequeued.
    pub fn depth(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_pending(&self, aid: i64) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&aid)
    }
}
