use anyhow::Result;
use eds_bridge::bridge::Bridge;
use eds_bridge::config::Config;

fn init_tracing(config: &Config) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;

    tracing::info!(
        device = %config.device_url,
        sink = %config.sink_url,
        interval_ms = config.poll_interval_ms,
        max_pending = ?config.max_pending,
        "eds-bridge starting"
    );
    let bridge = Bridge::start(&config)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    bridge.shutdown().await;

    Ok(())
}
