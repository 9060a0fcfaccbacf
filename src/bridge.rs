
use crate::config::Config;
use crate::forwarder::SinkForwarder;
use crate::pipeline::{self, PipelineStats};
use crate::poller::SourcePoller;
use crate::supervisor::{Supervisor, UnitHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The running poller/forwarder pair under one supervisor.
pub struct Bridge {
    supervisor: Supervisor,
    poller: UnitHandle,
    forwarder: UnitHandle,
    emitted: Arc<AtomicU64>,
    stats: Arc<PipelineStats>,
}

impl Bridge {
    /// Builds both units around a fresh hand-off channel and starts them. Must be called
    /// from inside a tokio runtime.
    pub fn start(config: &Config) -> Result<Self, reqwest::Error> {
        let stats = Arc::new(PipelineStats::new());
        let (handle, rx) = pipeline::channel();
        let emitted = handle.emitted_counter();
        let poller = SourcePoller::new(config, handle)?;
        let forwarder = SinkForwarder::new(config, rx, stats.clone())?;

        let mut supervisor = Supervisor::new(config.restart_spacing());
        let forwarder = supervisor.start(forwarder);
        let poller = supervisor.start(poller);

        Ok(Self {
            supervisor,
            poller,
            forwarder,
            emitted,
            stats,
        })
    }

    pub fn poller(&self) -> &UnitHandle {
        &self.poller
    }

    pub fn forwarder(&self) -> &UnitHandle {
        &self.forwarder
    }

    /// Samples the poller has handed off so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Delivery counters kept by the forwarder.
    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    pub async fn shutdown(self) {
        for handle in self.supervisor.handles() {
            tracing::info!(unit = handle.name(), restarts = handle.restarts(), "stopping unit");
        }
        self.supervisor.shutdown().await;
        self.stats.log_summary(self.emitted.load(Ordering::Relaxed));
    }
}
