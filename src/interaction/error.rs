use thiserror::Error;

use crate::optimization::OptimizerError;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("selected URL {0} never appeared in the suggestion list")]
    NoFirstEntryFound(String),

    #[error("selected rank {rank:?} outside of {len} suggestions")]
    SelectedRankOutOfRange { rank: Option<usize>, len: usize },
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("failed to classify interaction: {0}")]
    Classification(#[from] ClassifierError),

    #[error("failed to update model: {0}")]
    Optimization(#[from] OptimizerError),
}
