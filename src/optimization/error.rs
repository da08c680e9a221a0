use thiserror::Error;

use crate::places::ScoreError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("correct index {index} out of range for {len} candidates")]
    InvalidIndex { index: usize, len: usize },

    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoreError),

    #[error("failed to report local model update: {0}")]
    Report(#[source] SyncError),
}
