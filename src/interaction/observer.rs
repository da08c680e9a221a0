use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::classifier::{Classification, DropReason, InteractionClassifier};
use super::error::ObserverError;
use super::log::EventLog;
use super::types::{EventKind, ObservedEvent};
use crate::optimization::FrecencyOptimizer;
use crate::privacy::PrivacyGate;
use crate::study::MidStudySurvey;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum EventDisposition {
    Recorded,
    DroppedPrivate,
    SessionDropped { reason: DropReason },
    ModelUpdated { loss: f64 },
}

/// Records awesome bar events and trains on each closed session.
pub struct InteractionObserver {
    log: Mutex<EventLog>,
    privacy: Arc<dyn PrivacyGate>,
    optimizer: Arc<FrecencyOptimizer>,
    survey: Option<Arc<MidStudySurvey>>,
}

impl InteractionObserver {
    pub fn new(
        privacy: Arc<dyn PrivacyGate>,
        optimizer: Arc<FrecencyOptimizer>,
        survey: Option<Arc<MidStudySurvey>>,
    ) -> Self {
        Self {
            log: Mutex::new(EventLog::new()),
            privacy,
            optimizer,
            survey,
        }
    }

    pub async fn session_len(&self) -> usize {
        self.log.lock().await.len()
    }

    /// Handles one raw event. A blur closes the session and runs a training
    /// step on a snapshot of it; the log lock is not held during the step.
    pub async fn on_event(&self, event: ObservedEvent) -> Result<EventDisposition, ObserverError> {
        let kind = event.kind;

        // A focus always marks the start of a new interaction.
        if kind == EventKind::Focus {
            self.log.lock().await.clear();
        }

        if self.privacy.private_browsing_active().await {
            return Ok(EventDisposition::DroppedPrivate);
        }

        let closed_session = {
            let mut log = self.log.lock().await;
            log.append(event);
            (kind == EventKind::Blur).then(|| log.clone())
        };

        match closed_session {
            Some(session) => self.after_interaction(&session).await,
            None => Ok(EventDisposition::Recorded),
        }
    }

    pub async fn after_interaction(&self, session: &EventLog) -> Result<EventDisposition, ObserverError> {
        tracing::debug!(events = ?session.events(), "awesome bar interaction ended");

        let example = match InteractionClassifier::classify(session) {
            Ok(Classification::Example(example)) => example,
            Ok(Classification::Dropped(reason)) => {
                tracing::debug!(
                    "Dropping awesome bar interaction metadata ({:?})",
                    reason
                );
                return Ok(EventDisposition::SessionDropped { reason });
            }
            Err(err) => {
                tracing::error!(
                    events = ?session.events(),
                    "Failed to classify awesome bar interaction: {}",
                    err
                );
                return Err(err.into());
            }
        };

        let update = self.optimizer.step(&example).await?;

        if let Some(survey) = &self.survey {
            if let Err(err) = survey.record_interaction().await {
                tracing::warn!("Mid-study survey bookkeeping failed: {}", err);
            }
        }

        Ok(EventDisposition::ModelUpdated { loss: update.loss })
    }
}
