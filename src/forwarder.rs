use crate::config::Config;
use crate::error::DeliveryError;
use crate::pipeline::PipelineStats;
use crate::sample::Sample;
use crate::sink::encode_batch;
use crate::supervisor::{Unit, UnitOutcome};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Buffers samples from the poller and re-sends the whole backlog on every arrival until
/// the sink accepts it.
pub struct SinkForwarder {
    client: Client,
    sink_url: Url,
    debug: bool,
    max_pending: Option<usize>,
    rx: mpsc::Receiver<Sample>,
    pending: Vec<Sample>,
    stats: Arc<PipelineStats>,
}

impl SinkForwarder {
    pub fn new(
        config: &Config,
        rx: mpsc::Receiver<Sample>,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.post_timeout()).build()?;
        Ok(Self {
            client,
            sink_url: config.sink_url.clone(),
            debug: config.debug,
            max_pending: config.max_pending,
            rx,
            pending: Vec::new(),
            stats,
        })
    }

    fn buffer(&mut self, sample: Sample) {
        self.pending.push(sample);
        let Some(cap) = self.max_pending else {
            return;
        };
        if self.pending.len() > cap {
            let excess = self.pending.len() - cap;
            self.pending.drain(..excess);
            self.stats.record_dropped(excess);
            tracing::warn!(dropped = excess, cap, "pending buffer full; dropped oldest samples");
        }
    }

    async fn deliver(&self) -> Result<(), DeliveryError> {
        let body = encode_batch(&self.pending)?;
        if self.debug {
            tracing::info!(payload = %String::from_utf8_lossy(&body), "sink batch");
        }
        let response = self
            .client
            .post(self.sink_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }
}

impl Unit for SinkForwarder {
    fn name(&self) -> &'static str {
        "sink-forwarder"
    }

    async fn run(&mut self, stop: CancellationToken) -> UnitOutcome {
        loop {
            let sample = tokio::select! {
                _ = stop.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(sample) => sample,
                    None => {
                        tracing::info!("hand-off channel closed");
                        break;
                    }
                },
            };
            self.buffer(sample);

            let result = tokio::select! {
                _ = stop.cancelled() => break,
                result = self.deliver() => result,
            };
            match result {
                Ok(()) => {
                    let len = self.pending.len();
                    self.pending.clear();
                    self.stats.record_delivery(len);
                    tracing::debug!(len, "delivered batch");
                }
                Err(err) => {
                    let pending = self.pending.len();
                    self.stats.record_failure(pending, err.to_string());
                    tracing::warn!(error = %err, pending, "sink delivery failed (buffering)");
                }
            }
        }

        if !self.pending.is_empty() {
            tracing::warn!(pending = self.pending.len(), "stopping with undelivered samples");
        }
        UnitOutcome::Stopped
    }
}
