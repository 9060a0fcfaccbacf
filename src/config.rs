use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub device_url: Url,
    pub sink_url: Url,
    pub debug: bool,

    pub poll_interval_ms: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_attempts: u32,
    pub retry_backoff_ms: u64,

    pub post_timeout_secs: u64,
    pub max_pending: Option<usize>,

    pub restart_spacing_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let device_url = env_url("EDSURL")?;
        let sink_url = env_url("INFLUXURL")?;
        let debug = env_optional("EDSDEBUG").is_some();

        let poll_interval_secs = env_u64("EDS_POLL_INTERVAL_SECS", Some(60))?;
        if poll_interval_secs == 0 {
            return Err(anyhow!("EDS_POLL_INTERVAL_SECS must be greater than zero"));
        }
        let poll_interval_ms = poll_interval_secs.saturating_mul(1000);
        let fetch_timeout_secs = env_u64("EDS_FETCH_TIMEOUT_SECS", Some(30))?;
        let fetch_attempts = u32::try_from(env_u64("EDS_FETCH_ATTEMPTS", Some(5))?)
            .context("invalid EDS_FETCH_ATTEMPTS")?
            .max(1);
        let retry_backoff_ms = env_u64("EDS_RETRY_BACKOFF_MS", Some(1000))?;

        let post_timeout_secs = env_u64("INFLUX_POST_TIMEOUT_SECS", Some(30))?;
        let max_pending = match env_optional("INFLUX_MAX_PENDING") {
            Some(raw) => {
                let cap = raw
                    .parse::<usize>()
                    .context("invalid INFLUX_MAX_PENDING")?;
                Some(cap.max(1))
            }
            None => None,
        };

        let restart_spacing_ms = env_u64("EDS_RESTART_SPACING_MS", Some(1000))?;

        Ok(Self {
            device_url,
            sink_url,
            debug,
            poll_interval_ms,
            fetch_timeout_secs,
            fetch_attempts,
            retry_backoff_ms,
            post_timeout_secs,
            max_pending,
            restart_spacing_ms,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_backoff_step(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_secs(self.post_timeout_secs)
    }

    pub fn restart_spacing(&self) -> Duration {
        Duration::from_millis(self.restart_spacing_ms)
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "info,eds_bridge=debug"
        } else {
            "info,eds_bridge=info"
        }
    }
}

fn env_url(key: &str) -> Result<Url> {
    let raw = env_optional(key).ok_or_else(|| anyhow!("missing env var {key}"))?;
    Url::parse(&raw).with_context(|| format!("invalid {key}"))
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env_optional(key) {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        None => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config(device_url: &str, sink_url: &str) -> Config {
    Config {
        device_url: Url::parse(device_url).unwrap(),
        sink_url: Url::parse(sink_url).unwrap(),
        debug: true,
        poll_interval_ms: 300,
        fetch_timeout_secs: 5,
        fetch_attempts: 5,
        retry_backoff_ms: 10,
        post_timeout_secs: 5,
        max_pending: None,
        restart_spacing_ms: 50,
    }
}
