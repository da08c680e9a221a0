//! Outbound telemetry: the report payload and its transports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::SyncError;
use crate::optimization::LocalModelUpdate;

/// Sentinel used on the wire for "not applicable" numbers.
const NOT_APPLICABLE: i64 = -1;

/// Report of one local model update, keyed the way the analysis pipeline
/// expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub model_version: i64,
    pub frecency_scores: Vec<f64>,
    pub loss: f64,
    pub update: Vec<f64>,
    pub num_suggestions_displayed: usize,
    pub rank_selected: i64,
    pub bookmark_and_history_num_suggestions_displayed: usize,
    pub bookmark_and_history_rank_selected: i64,
    pub num_key_down_events_at_selecteds_first_entry: i64,
    pub num_key_down_events: usize,
    pub time_start_interaction: i64,
    pub time_end_interaction: i64,
    pub time_at_selecteds_first_entry: i64,
    pub search_string_length: usize,
    pub selected_style: String,
    /// `1`/`0` for a selection, `-1` otherwise.
    pub selected_url_was_same_as_search_string: i64,
    pub enter_was_pressed: i64,
    pub study_variation: String,
    pub study_addon_version: String,
}

fn or_sentinel(value: Option<usize>) -> i64 {
    value
        .and_then(|v| i64::try_from(v).ok())
        .unwrap_or(NOT_APPLICABLE)
}

impl TelemetryPayload {
    pub fn from_update(
        update: &LocalModelUpdate,
        model_version: i64,
        study_variation: &str,
        study_addon_version: &str,
    ) -> Self {
        let example = &update.example;
        Self {
            model_version,
            frecency_scores: update.frecency_scores.clone(),
            loss: update.loss,
            update: update.gradient.clone(),
            num_suggestions_displayed: example.num_suggestions_displayed,
            rank_selected: or_sentinel(example.rank_selected),
            bookmark_and_history_num_suggestions_displayed: example.bookmark_history_urls.len(),
            bookmark_and_history_rank_selected: or_sentinel(example.bookmark_history_rank_selected),
            num_key_down_events_at_selecteds_first_entry: or_sentinel(
                example.num_key_down_at_first_entry,
            ),
            num_key_down_events: example.num_key_down_total,
            // Times are relative to the focus.
            time_start_interaction: 0,
            time_end_interaction: example.interaction_duration_ms,
            time_at_selecteds_first_entry: example
                .time_to_first_entry_ms
                .unwrap_or(NOT_APPLICABLE),
            search_string_length: example.search_string_length,
            selected_style: example.selected_style.clone().unwrap_or_default(),
            selected_url_was_same_as_search_string: example
                .url_matched_search_string
                .map(i64::from)
                .unwrap_or(NOT_APPLICABLE),
            enter_was_pressed: i64::from(example.enter_pressed),
            study_variation: study_variation.to_string(),
            study_addon_version: study_addon_version.to_string(),
        }
    }
}

/// Envelope around a payload as it leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPing {
    pub ping_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub testing: bool,
    pub payload: TelemetryPayload,
}

impl TelemetryPing {
    pub fn new(payload: TelemetryPayload, testing: bool) -> Self {
        Self {
            ping_id: Uuid::new_v4(),
            created_at: Utc::now(),
            testing,
            payload,
        }
    }
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, ping: &TelemetryPing) -> Result<(), SyncError>;
}

/// Appends pings as JSON lines to a local archive.
pub struct ArchiveTelemetrySink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ArchiveTelemetrySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all(&self) -> Result<Vec<TelemetryPing>, SyncError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SyncError::Telemetry(err.to_string())),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| SyncError::Telemetry(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl TelemetrySink for ArchiveTelemetrySink {
    fn name(&self) -> &str {
        "archive"
    }

    async fn submit(&self, ping: &TelemetryPing) -> Result<(), SyncError> {
        let mut line =
            serde_json::to_string(ping).map_err(|e| SyncError::Telemetry(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Telemetry(e.to_string()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SyncError::Telemetry(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SyncError::Telemetry(e.to_string()))?;
        Ok(())
    }
}

/// POSTs pings to a collection endpoint.
pub struct HttpTelemetrySink {
    client: Client,
    endpoint: String,
}

impl HttpTelemetrySink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, ping: &TelemetryPing) -> Result<(), SyncError> {
        let response = self.client.post(&self.endpoint).json(ping).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                url: self.endpoint.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Forwards each ping to every configured transport. Fails if any fails,
/// after all have been attempted.
#[derive(Default)]
pub struct TelemetryTransports {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl TelemetryTransports {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl TelemetrySink for TelemetryTransports {
    fn name(&self) -> &str {
        "transports"
    }

    async fn submit(&self, ping: &TelemetryPing) -> Result<(), SyncError> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.submit(ping).await {
                tracing::warn!("Telemetry transport '{}' failed: {}", sink.name(), err);
                failures.push(format!("{}: {}", sink.name(), err));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Telemetry(failures.join("; ")))
        }
    }
}
