use std::sync::Arc;

use super::error::OptimizerError;
use super::weights::WeightVector;
use crate::places::FrecencyScorer;

/// Pairwise hinge loss of a ranking given the index of the correct item.
///
/// Every candidate scored strictly above the correct one adds its excess.
/// An empty list, or no labeled item, has nothing to compare and costs 0.
pub fn hinge_loss(scores: &[f64], correct: Option<usize>) -> Result<f64, OptimizerError> {
    if scores.is_empty() {
        return Ok(0.0);
    }
    let Some(correct) = correct else {
        return Ok(0.0);
    };
    let correct_score = *scores.get(correct).ok_or(OptimizerError::InvalidIndex {
        index: correct,
        len: scores.len(),
    })?;

    Ok(scores
        .iter()
        .filter(|score| **score > correct_score)
        .map(|score| score - correct_score)
        .sum())
}

/// Scores candidate URLs through the external scorer and evaluates the
/// pairwise loss.
#[derive(Clone)]
pub struct PairwiseLossEstimator {
    scorer: Arc<dyn FrecencyScorer>,
}

impl PairwiseLossEstimator {
    pub fn new(scorer: Arc<dyn FrecencyScorer>) -> Self {
        Self { scorer }
    }

    pub async fn frecencies(
        &self,
        urls: &[String],
        weights: &WeightVector,
    ) -> Result<Vec<f64>, OptimizerError> {
        let mut scores = Vec::with_capacity(urls.len());
        for url in urls {
            scores.push(self.scorer.score(url, weights).await?);
        }
        Ok(scores)
    }

    pub async fn loss(
        &self,
        urls: &[String],
        correct: Option<usize>,
        weights: &WeightVector,
    ) -> Result<f64, OptimizerError> {
        let scores = self.frecencies(urls, weights).await?;
        hinge_loss(&scores, correct)
    }
}
