use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use super::error::SyncError;
use super::schedule::{ms_until_next_iteration, MINUTES_PER_ITERATION};
use super::telemetry::{TelemetryPayload, TelemetryPing, TelemetrySink};
use crate::optimization::{FrecencyParam, LocalModelUpdate, SharedWeights, UpdateSink, WeightVector};
use crate::places::FrecencyScorer;
use crate::study::BranchConfig;

pub const URL_ENDPOINT_TEMPLATE: &str =
    "https://public-data.telemetry.mozilla.org/federated-learning-v2/{modelNumber}/latest.json";

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub endpoint_template: String,
    /// Replaces the templated endpoint wholesale.
    pub endpoint_override: Option<String>,
    pub minutes_per_iteration: u32,
    pub request_timeout: Duration,
    pub addon_version: String,
    /// Marks outgoing pings as test data.
    pub testing: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint_template: URL_ENDPOINT_TEMPLATE.to_string(),
            endpoint_override: None,
            minutes_per_iteration: MINUTES_PER_ITERATION,
            request_timeout: Duration::from_secs(30),
            addon_version: env!("CARGO_PKG_VERSION").to_string(),
            testing: false,
        }
    }
}

/// Published model: iteration number and weights in parameter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteModel {
    pub iteration: u64,
    pub model: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelState {
    /// -1 until the first remote model is applied.
    pub version: i64,
    pub applied_weights: Option<WeightVector>,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub last_fetch_scheduled_at: Option<DateTime<Utc>>,
}

impl Default for ModelState {
    fn default() -> Self {
        Self {
            version: -1,
            applied_weights: None,
            last_applied_at: None,
            last_fetch_scheduled_at: None,
        }
    }
}

impl ModelState {
    pub fn is_synced(&self) -> bool {
        self.version >= 0
    }
}

/// Keeps the local weights in line with the published model and forwards
/// local training signals upstream.
pub struct ModelSynchronizer {
    branch: BranchConfig,
    settings: SyncSettings,
    client: Client,
    weights: SharedWeights,
    scorer: Arc<dyn FrecencyScorer>,
    telemetry: Arc<dyn TelemetrySink>,
    state: RwLock<ModelState>,
}

impl ModelSynchronizer {
    pub fn new(
        branch: BranchConfig,
        settings: SyncSettings,
        weights: SharedWeights,
        scorer: Arc<dyn FrecencyScorer>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            branch,
            settings,
            client,
            weights,
            scorer,
            telemetry,
            state: RwLock::new(ModelState::default()),
        })
    }

    pub fn branch(&self) -> &BranchConfig {
        &self.branch
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Endpoint of the branch's model, or `None` for branches without one.
    pub fn model_url(&self) -> Option<String> {
        let model_number = self.branch.model_number?;
        match &self.settings.endpoint_override {
            Some(url) if !url.is_empty() => Some(url.clone()),
            _ => Some(
                self.settings
                    .endpoint_template
                    .replace("{modelNumber}", &model_number.to_string()),
            ),
        }
    }

    pub async fn state(&self) -> ModelState {
        self.state.read().await.clone()
    }

    pub async fn version(&self) -> i64 {
        self.state.read().await.version
    }

    /// Fetches the branch's model and applies it. Returns the new version.
    pub async fn fetch_and_apply(&self) -> Result<i64, SyncError> {
        let url = self
            .model_url()
            .ok_or_else(|| SyncError::NoModel(self.branch.name.clone()))?;
        tracing::info!("Fetching model from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await?;
        let remote: RemoteModel =
            serde_json::from_str(&body).map_err(|e| SyncError::Parse(e.to_string()))?;

        self.apply_remote_model(remote).await
    }

    /// Overwrites every weight with the remote values and refreshes the
    /// cached frecencies. Returns the applied version. A model of the wrong
    /// length leaves everything untouched.
    ///
    /// A [`SyncError::Scoring`] means the model was applied but the cached
    /// frecencies are stale.
    pub async fn apply_remote_model(&self, remote: RemoteModel) -> Result<i64, SyncError> {
        tracing::debug!(iteration = remote.iteration, model = ?remote.model, "remote model");

        let version = i64::try_from(remote.iteration)
            .map_err(|_| SyncError::Parse(format!("iteration {} out of range", remote.iteration)))?;
        let applied = WeightVector::from_model(&remote.model).ok_or(SyncError::ModelShape {
            expected: FrecencyParam::COUNT,
            actual: remote.model.len(),
        })?;

        tracing::info!("Applying frecency weights");
        {
            let mut weights = self.weights.lock().await;
            *weights = applied;
        }
        {
            let mut state = self.state.write().await;
            state.version = version;
            state.applied_weights = Some(applied);
            state.last_applied_at = Some(Utc::now());
        }

        tracing::info!("Updating all frecencies");
        let refreshed = self.scorer.recalculate_all(&applied).await?;
        tracing::debug!(places = refreshed, "frecencies recalculated");
        Ok(version)
    }

    /// Submits `update` when the branch reports frecency updates. Returns
    /// whether a ping was sent.
    pub async fn report(&self, update: &LocalModelUpdate) -> Result<bool, SyncError> {
        tracing::info!("Local model was updated");
        if !self.branch.submit_frecency_update {
            tracing::debug!(branch = %self.branch.name, "frecency updates are not submitted");
            return Ok(false);
        }

        let payload = TelemetryPayload::from_update(
            update,
            self.version().await,
            &self.branch.name,
            &self.settings.addon_version,
        );
        let ping = TelemetryPing::new(payload, self.settings.testing);
        self.telemetry.submit(&ping).await?;
        Ok(true)
    }

    async fn schedule_next(&self) -> Duration {
        let now = Utc::now();
        let delay = ms_until_next_iteration(&now, self.settings.minutes_per_iteration);
        let at = now + chrono::Duration::milliseconds(delay as i64);
        self.state.write().await.last_fetch_scheduled_at = Some(at);
        tracing::debug!("Next model fetch at {}", at);
        Duration::from_millis(delay)
    }

    /// Starts the fetch loop: one fetch right away, then one at every
    /// iteration boundary. Branches without a model never fetch.
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move { self.run(shutdown_rx).await });
        SyncHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        if self.model_url().is_none() {
            tracing::info!(branch = %self.branch.name, "Branch has no remote model, sync disabled");
            return;
        }

        loop {
            match self.fetch_and_apply().await {
                Ok(version) => tracing::info!("Remote model {} applied", version),
                Err(SyncError::Scoring(err)) => {
                    let version = self.version().await;
                    tracing::warn!(
                        "Remote model {} applied but frecency recalculation failed: {}",
                        version,
                        err
                    );
                }
                Err(err) => tracing::warn!("Model fetch failed, retrying next iteration: {}", err),
            }

            let delay = self.schedule_next().await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("Model sync task received shutdown signal");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl UpdateSink for ModelSynchronizer {
    async fn on_local_model_update(&self, update: &LocalModelUpdate) -> Result<(), SyncError> {
        self.report(update).await.map(|_| ())
    }
}

/// Handle on the background fetch loop.
pub struct SyncHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!("Model sync task ended abnormally: {}", err);
            }
        }
    }
}
