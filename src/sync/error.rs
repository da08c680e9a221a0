use thiserror::Error;

use crate::places::ScoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed remote model: {0}")]
    Parse(String),

    #[error("remote model has {actual} weights, expected {expected}")]
    ModelShape { expected: usize, actual: usize },

    #[error("branch '{0}' has no remote model")]
    NoModel(String),

    #[error("failed to refresh frecencies: {0}")]
    Scoring(#[from] ScoreError),

    #[error("telemetry submission failed: {0}")]
    Telemetry(String),
}
