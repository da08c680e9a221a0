//! Finite-difference gradient estimation over the frecency parameters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::error::OptimizerError;
use super::loss::{hinge_loss, PairwiseLossEstimator};
use super::params::FrecencyParam;
use super::weights::{Perturbation, SharedWeights, WeightVector};
use crate::interaction::TrainingExample;
use crate::places::FrecencyScorer;
use crate::sync::SyncError;

pub const DEFAULT_EPSILON: i64 = 1;

/// Signals computed for one interaction, handed to the synchronizer.
#[derive(Debug, Clone, Serialize)]
pub struct LocalModelUpdate {
    pub frecency_scores: Vec<f64>,
    pub loss: f64,
    pub gradient: Vec<f64>,
    pub example: TrainingExample,
}

/// Receiver of local model updates.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn on_local_model_update(&self, update: &LocalModelUpdate) -> Result<(), SyncError>;
}

pub struct FrecencyOptimizer {
    weights: SharedWeights,
    estimator: PairwiseLossEstimator,
    sink: Arc<dyn UpdateSink>,
    eps: i64,
}

impl FrecencyOptimizer {
    pub fn new(
        weights: SharedWeights,
        scorer: Arc<dyn FrecencyScorer>,
        sink: Arc<dyn UpdateSink>,
        eps: i64,
    ) -> Self {
        Self {
            weights,
            estimator: PairwiseLossEstimator::new(scorer),
            sink,
            eps: eps.max(1),
        }
    }

    pub fn epsilon(&self) -> i64 {
        self.eps
    }

    /// Runs one optimization step for `example` and reports the result.
    ///
    /// Errors are logged and returned; no report is sent for a failed step.
    pub async fn step(&self, example: &TrainingExample) -> Result<LocalModelUpdate, OptimizerError> {
        tracing::debug!(
            num_suggestions_displayed = example.num_suggestions_displayed,
            rank_selected = ?example.rank_selected,
            bookmark_history_urls = ?example.bookmark_history_urls,
            bookmark_history_rank_selected = ?example.bookmark_history_rank_selected,
            num_key_down_total = example.num_key_down_total,
            search_string_length = example.search_string_length,
            selected_style = ?example.selected_style,
            "frecency optimizer step entered"
        );

        let update = match self.evaluate(example).await {
            Ok(update) => update,
            Err(err) => {
                tracing::error!("Frecency optimizer step failed: {}", err);
                return Err(err);
            }
        };

        if let Err(err) = self.sink.on_local_model_update(&update).await {
            tracing::error!("Failed to report local model update: {}", err);
            return Err(OptimizerError::Report(err));
        }
        Ok(update)
    }

    /// Central finite difference for every parameter, in parameter order.
    ///
    /// Each component is `(loss(v - eps) - loss(v + eps)) / (2 * eps)`, the
    /// negated slope, so a positive entry means raising the weight lowers the
    /// loss.
    pub async fn gradient(
        &self,
        urls: &[String],
        correct: Option<usize>,
    ) -> Result<Vec<f64>, OptimizerError> {
        let mut weights = self.weights.lock().await;
        self.compute_gradient(&mut weights, urls, correct).await
    }

    async fn evaluate(&self, example: &TrainingExample) -> Result<LocalModelUpdate, OptimizerError> {
        let urls = &example.bookmark_history_urls;
        let correct = example.bookmark_history_rank_selected;

        let mut weights = self.weights.lock().await;
        let frecency_scores = self.estimator.frecencies(urls, &weights).await?;
        let loss = hinge_loss(&frecency_scores, correct)?;
        let gradient = self.compute_gradient(&mut weights, urls, correct).await?;
        drop(weights);

        Ok(LocalModelUpdate {
            frecency_scores,
            loss,
            gradient,
            example: example.clone(),
        })
    }

    async fn compute_gradient(
        &self,
        weights: &mut WeightVector,
        urls: &[String],
        correct: Option<usize>,
    ) -> Result<Vec<f64>, OptimizerError> {
        let mut gradient = Vec::with_capacity(FrecencyParam::COUNT);

        for param in FrecencyParam::ALL {
            let mut perturbation = Perturbation::begin(weights, param);

            perturbation.offset(-self.eps);
            let loss_low = self
                .estimator
                .loss(urls, correct, perturbation.weights())
                .await?;

            perturbation.offset(self.eps);
            let loss_high = self
                .estimator
                .loss(urls, correct, perturbation.weights())
                .await?;

            drop(perturbation);
            gradient.push((loss_low - loss_high) / (2.0 * self.eps as f64));
        }

        Ok(gradient)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::places::ScoreError;

    /// Scores each URL as a linear function of one parameter.
    struct LinearScorer {
        slopes: HashMap<String, (FrecencyParam, f64)>,
        fail_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl LinearScorer {
        fn new(slopes: &[(&str, FrecencyParam, f64)]) -> Self {
            Self {
                slopes: slopes
                    .iter()
                    .map(|(url, param, slope)| (url.to_string(), (*param, *slope)))
                    .collect(),
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_after(mut self, calls: usize) -> Self {
            self.fail_after = Some(calls);
            self
        }
    }

    #[async_trait]
    impl FrecencyScorer for LinearScorer {
        async fn score(&self, url: &str, weights: &WeightVector) -> Result<f64, ScoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| call >= limit) {
                return Err(ScoreError::Failed {
                    url: url.to_string(),
                    reason: "forced failure".to_string(),
                });
            }
            Ok(self
                .slopes
                .get(url)
                .map(|(param, slope)| weights.get(*param) as f64 * slope)
                .unwrap_or(0.0))
        }

        async fn recalculate_all(&self, _weights: &WeightVector) -> Result<usize, ScoreError> {
            Ok(self.slopes.len())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<LocalModelUpdate>>,
    }

    #[async_trait]
    impl UpdateSink for RecordingSink {
        async fn on_local_model_update(&self, update: &LocalModelUpdate) -> Result<(), SyncError> {
            self.updates.lock().unwrap().push(update.clone());
            Ok(())
        }
    }

    fn example(urls: &[&str], correct: Option<usize>) -> TrainingExample {
        TrainingExample {
            num_suggestions_displayed: urls.len(),
            rank_selected: correct,
            bookmark_history_urls: urls.iter().map(|u| u.to_string()).collect(),
            bookmark_history_rank_selected: correct,
            num_key_down_at_first_entry: correct.map(|_| 2),
            num_key_down_total: 3,
            interaction_duration_ms: 1500,
            time_to_first_entry_ms: correct.map(|_| 400),
            search_string_length: 3,
            selected_style: correct.map(|_| "favicon".to_string()),
            url_matched_search_string: correct.map(|_| false),
            enter_pressed: true,
        }
    }

    fn optimizer(scorer: LinearScorer, eps: i64) -> (FrecencyOptimizer, SharedWeights, Arc<RecordingSink>) {
        let weights = SharedWeights::default();
        let sink = Arc::new(RecordingSink::default());
        let optimizer = FrecencyOptimizer::new(weights.clone(), Arc::new(scorer), sink.clone(), eps);
        (optimizer, weights, sink)
    }

    #[tokio::test]
    async fn gradient_is_the_descent_direction() {
        // Competitor outranks the correct URL: 100 * 1.0 against 100 * 0.5.
        let scorer = LinearScorer::new(&[
            ("https://competitor.test/", FrecencyParam::LinkVisitBonus, 1.0),
            ("https://correct.test/", FrecencyParam::FirstBucketWeight, 0.5),
        ]);
        let (optimizer, _, _) = optimizer(scorer, 1);
        let urls = vec![
            "https://competitor.test/".to_string(),
            "https://correct.test/".to_string(),
        ];

        let gradient = optimizer.gradient(&urls, Some(1)).await.unwrap();
        assert_eq!(gradient.len(), FrecencyParam::COUNT);
        // (49 - 51) / 2: raising linkVisitBonus increases the loss
        assert_eq!(gradient[FrecencyParam::LinkVisitBonus.index()], -1.0);
        // (50.5 - 49.5) / 2: raising firstBucketWeight decreases the loss
        assert_eq!(gradient[FrecencyParam::FirstBucketWeight.index()], 0.5);
        assert_eq!(gradient[FrecencyParam::ReloadVisitBonus.index()], 0.0);
    }

    #[tokio::test]
    async fn gradient_restores_weights_for_all_step_sizes() {
        for eps in [1, 2, 5, 100] {
            let scorer = LinearScorer::new(&[
                ("https://a.test/", FrecencyParam::FirstBucketWeight, 2.0),
                ("https://b.test/", FrecencyParam::DefaultBucketWeight, 3.0),
            ]);
            let (optimizer, weights, _) = optimizer(scorer, eps);
            let before = weights.snapshot().await;
            let urls = vec!["https://a.test/".to_string(), "https://b.test/".to_string()];
            optimizer.gradient(&urls, Some(1)).await.unwrap();
            assert_eq!(weights.snapshot().await, before);
        }
    }

    #[tokio::test]
    async fn failure_mid_loop_restores_weights_and_skips_report() {
        for fail_after in [0, 1, 3, 7, 20] {
            let scorer = LinearScorer::new(&[
                ("https://a.test/", FrecencyParam::SecondBucketWeight, 1.0),
                ("https://b.test/", FrecencyParam::ThirdBucketWeight, 1.0),
            ])
            .failing_after(fail_after);
            let (optimizer, weights, sink) = optimizer(scorer, 3);
            weights.set(FrecencyParam::SecondBucketWeight, 71).await;
            let before = weights.snapshot().await;

            let result = optimizer
                .step(&example(&["https://a.test/", "https://b.test/"], Some(0)))
                .await;

            assert!(matches!(result, Err(OptimizerError::Scoring(_))));
            assert_eq!(weights.snapshot().await, before);
            assert!(sink.updates.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn step_reports_scores_loss_and_gradient() {
        let scorer = LinearScorer::new(&[
            ("https://a.test/", FrecencyParam::LinkVisitBonus, 1.0),
            ("https://b.test/", FrecencyParam::FirstBucketWeight, 0.25),
        ]);
        let (optimizer, _, sink) = optimizer(scorer, 1);

        let update = optimizer
            .step(&example(&["https://a.test/", "https://b.test/"], Some(1)))
            .await
            .unwrap();

        assert_eq!(update.frecency_scores, vec![100.0, 25.0]);
        assert_eq!(update.loss, 75.0);
        assert_eq!(update.gradient.len(), FrecencyParam::COUNT);
        let reported = sink.updates.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].loss, 75.0);
    }

    #[tokio::test]
    async fn empty_candidate_list_yields_zero_signals() {
        let (optimizer, _, sink) = optimizer(LinearScorer::new(&[]), 1);
        let update = optimizer.step(&example(&[], None)).await.unwrap();
        assert!(update.frecency_scores.is_empty());
        assert_eq!(update.loss, 0.0);
        assert!(update.gradient.iter().all(|g| *g == 0.0));
        assert_eq!(sink.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_rank_aborts_step() {
        let (optimizer, weights, sink) = optimizer(LinearScorer::new(&[]), 1);
        let before = weights.snapshot().await;
        let result = optimizer.step(&example(&["https://a.test/"], Some(4))).await;
        assert!(matches!(result, Err(OptimizerError::InvalidIndex { index: 4, len: 1 })));
        assert_eq!(weights.snapshot().await, before);
        assert!(sink.updates.lock().unwrap().is_empty());
    }

    #[test]
    fn epsilon_is_at_least_one() {
        let (optimizer, _, _) = optimizer(LinearScorer::new(&[]), 0);
        assert_eq!(optimizer.epsilon(), 1);
    }
}
