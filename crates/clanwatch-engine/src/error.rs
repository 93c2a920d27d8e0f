use clanwatch_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("roster fetch timed out after {0}s")]
    Timeout(u64),

    #[error("roster source returned no data")]
    DataUnavailable,

    #[error("notification delivery failed: {0}")]
    Notify(String),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
