use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("device request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("device returned {0}")]
    Status(StatusCode),
}

#[derive(Debug, Error)]
#[error("malformed device document: {0}")]
pub struct ParseError(#[from] pub roxmltree::Error);

#[derive(Debug, Error)]
#[error("failed to encode sink batch: {0}")]
pub struct SerializationError(#[from] pub serde_json::Error);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("sink request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sink returned {0}")]
    Status(StatusCode),
}

/// Reason a unit's run loop terminated on its own.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("device unreachable after {attempts} attempts: {source}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("hand-off channel closed")]
    ChannelClosed,
    #[error("unit panicked: {0}")]
    Panicked(String),
}
