//! Background refresh: a de-duplicating FIFO queue drained by one worker.

mod queue;
mod worker;

pub use queue::RefreshQueue;
pub use worker::{RefreshWorker, WorkerHandle};
