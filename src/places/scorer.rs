use async_trait::async_trait;
use thiserror::Error;

use crate::optimization::WeightVector;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("frecency scorer unavailable: {0}")]
    Unavailable(String),
    #[error("failed to score {url}: {reason}")]
    Failed { url: String, reason: String },
}

/// Scores candidate URLs against a weight vector.
///
/// `score` must reflect exactly the weights it is handed, so that the
/// optimizer observes its own perturbations.
#[async_trait]
pub trait FrecencyScorer: Send + Sync {
    /// return the frecency of `url` under `weights`
    async fn score(&self, url: &str, weights: &WeightVector) -> Result<f64, ScoreError>;

    /// recompute every cached score after a wholesale weight change,
    /// returning how many entries were refreshed
    async fn recalculate_all(&self, weights: &WeightVector) -> Result<usize, ScoreError>;
}
