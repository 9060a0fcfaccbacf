use crate::sample::Sample;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc;

/// One in-flight sample at most: the poller's send parks until the forwarder has taken
/// the previous one.
const HANDOFF_CAPACITY: usize = 1;

/// Sending side of the hand-off. The emitted counter is written only by the poller.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Sample>,
    emitted: Arc<AtomicU64>,
}

impl PipelineHandle {
    /// A read-only view of the emitted count that does not keep the channel open.
    pub fn emitted_counter(&self) -> Arc<AtomicU64> {
        self.emitted.clone()
    }

    /// Hands a sample to the forwarder. Errors only when the receiving side is gone.
    pub async fn emit(&self, sample: Sample) -> Result<(), mpsc::error::SendError<Sample>> {
        self.tx.send(sample).await?;
        let emitted = self.emitted.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(emitted, "handed off sample");
        Ok(())
    }
}

pub fn channel() -> (PipelineHandle, mpsc::Receiver<Sample>) {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let emitted = Arc::new(AtomicU64::new(0));
    (PipelineHandle { tx, emitted }, rx)
}

/// Delivery counters owned by the forwarder.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub delivered: AtomicU64,
    pub delivery_failures: AtomicU64,
    pub dropped: AtomicU64,
    pub pending: AtomicU64,
    pub last_error: Mutex<Option<String>>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivery(&self, len: usize) {
        self.delivered.fetch_add(len as u64, Ordering::Relaxed);
        self.pending.store(0, Ordering::Relaxed);
        self.clear_error();
    }

    pub fn record_failure(&self, pending: usize, err: impl Into<String>) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        self.pending.store(pending as u64, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }

    pub fn record_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }

    fn clear_error(&self) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = None;
        }
    }

    pub fn log_summary(&self, emitted: u64) {
        tracing::info!(
            emitted,
            delivered = self.delivered.load(Ordering::Relaxed),
            delivery_failures = self.delivery_failures.load(Ordering::Relaxed),
            dropped = self.dropped.load(Ordering::Relaxed),
            pending = self.pending.load(Ordering::Relaxed),
            last_error = self.last_error().as_deref().unwrap_or(""),
            "pipeline totals"
        );
    }
}
