use crate::config::Config;
use crate::device::parse_details;
use crate::error::{FetchError, UnitError};
use crate::pipeline::PipelineHandle;
use crate::sample::Sample;
use crate::supervisor::{Unit, UnitOutcome};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Reads the device on a wall-clock aligned cadence and hands each sample downstream.
pub struct SourcePoller {
    client: Client,
    device_url: Url,
    interval: Duration,
    attempts: u32,
    backoff_step: Duration,
    debug: bool,
    out: PipelineHandle,
}

impl SourcePoller {
    pub fn new(config: &Config, out: PipelineHandle) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.fetch_timeout()).build()?;
        Ok(Self {
            client,
            device_url: config.device_url.clone(),
            interval: config.poll_interval(),
            attempts: config.fetch_attempts.max(1),
            backoff_step: config.retry_backoff_step(),
            debug: config.debug,
            out,
        })
    }

    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self.client.get(self.device_url.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status));
        }
        Ok(response.text().await?)
    }

    /// `Ok(None)` means stop was requested mid-way.
    async fn fetch_with_retry(&self, stop: &CancellationToken) -> Result<Option<String>, UnitError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = stop.cancelled() => return Ok(None),
                result = self.fetch() => result,
            };
            let err = match result {
                Ok(body) => return Ok(Some(body)),
                Err(err) => err,
            };
            if attempt >= self.attempts {
                tracing::error!(error = %err, attempt, "device fetch failed (fatal)");
                return Err(UnitError::FetchExhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let backoff = self.backoff_step * attempt;
            tracing::warn!(
                error = %err,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "device fetch failed (retrying)"
            );
            tokio::select! {
                _ = stop.cancelled() => return Ok(None),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn poll_once(&self, stop: &CancellationToken) -> Result<Option<Sample>, UnitError> {
        let Some(body) = self.fetch_with_retry(stop).await? else {
            return Ok(None);
        };
        let taken_at = Utc::now();
        if self.debug {
            tracing::info!(body = %body, "device document");
        }
        let sample = parse_details(&body, taken_at).map_err(|err| {
            tracing::error!(error = %err, "device document parse failed (fatal)");
            UnitError::from(err)
        })?;
        if !sample.is_complete() {
            tracing::debug!(
                temperature = ?sample.temperature,
                energy_counter = ?sample.energy_counter,
                "device reading incomplete"
            );
        }
        Ok(Some(sample))
    }
}

impl Unit for SourcePoller {
    fn name(&self) -> &'static str {
        "source-poller"
    }

    async fn run(&mut self, stop: CancellationToken) -> UnitOutcome {
        let delay = alignment_delay(SystemTime::now(), self.interval);
        if self.debug {
            tracing::info!(delay_ms = delay.as_millis() as u64, "waiting to get in step");
        }
        tokio::select! {
            _ = stop.cancelled() => return UnitOutcome::Stopped,
            _ = tokio::time::sleep(delay) => {}
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.cancelled() => return UnitOutcome::Stopped,
                _ = ticker.tick() => {}
            }

            let sample = match self.poll_once(&stop).await {
                Ok(Some(sample)) => sample,
                Ok(None) => return UnitOutcome::Stopped,
                Err(err) => return UnitOutcome::Failed(err),
            };

            tokio::select! {
                _ = stop.cancelled() => return UnitOutcome::Stopped,
                sent = self.out.emit(sample) => {
                    if sent.is_err() {
                        return UnitOutcome::Failed(UnitError::ChannelClosed);
                    }
                }
            }
        }
    }
}

/// Time left until the next multiple of `interval` since the Unix epoch. A reading
/// taken exactly on a boundary waits a full interval.
pub fn alignment_delay(now: SystemTime, interval: Duration) -> Duration {
    let interval_nanos = interval.as_nanos();
    if interval_nanos == 0 {
        return Duration::ZERO;
    }
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let elapsed = since_epoch.as_nanos() % interval_nanos;
    Duration::from_nanos(u64::try_from(interval_nanos - elapsed).unwrap_or(u64::MAX))
}
