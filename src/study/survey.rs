use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::StudyError;
use super::setup::survey_url;
use super::storage::StudyStorage;

/// Interactions counted within the period before the survey fires.
const INTERACTIONS_BEFORE_SURVEY: u32 = 2;
pub const SURVEY_DELAY: Duration = Duration::from_secs(5);

/// Opens survey pages for the user.
#[async_trait]
pub trait SurveyTrigger: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), StudyError>;
}

/// Records survey requests in the log for the browser shim to pick up.
pub struct LoggingSurveyTrigger;

#[async_trait]
impl SurveyTrigger for LoggingSurveyTrigger {
    async fn open(&self, url: &str) -> Result<(), StudyError> {
        tracing::info!(url, "Firing mid-study survey");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "survey", rename_all = "snake_case")]
pub enum SurveyProgress {
    NotStarted,
    AlreadyFired,
    Counted { interactions: u32 },
    Fired,
}

pub struct MidStudySurvey {
    storage: StudyStorage,
    trigger: Arc<dyn SurveyTrigger>,
    period_starts_at: DateTime<Utc>,
    delay: Duration,
}

impl MidStudySurvey {
    pub fn new(
        storage: StudyStorage,
        trigger: Arc<dyn SurveyTrigger>,
        period_starts_at: DateTime<Utc>,
    ) -> Self {
        Self {
            storage,
            trigger,
            period_starts_at,
            delay: SURVEY_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn url() -> String {
        survey_url("mid-study-survey")
    }

    /// Counts one completed interaction; the second one inside the survey
    /// period schedules the survey.
    pub async fn record_interaction(&self) -> Result<SurveyProgress, StudyError> {
        self.record_interaction_at(Utc::now()).await
    }

    pub async fn record_interaction_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SurveyProgress, StudyError> {
        let period_due = now >= self.period_starts_at;
        let progress = self.storage.update(|data| {
            if !data.mid_study_survey_period_started && period_due {
                data.mid_study_survey_period_started = true;
            }
            if !data.mid_study_survey_period_started {
                return SurveyProgress::NotStarted;
            }
            if data.mid_study_survey_fired {
                return SurveyProgress::AlreadyFired;
            }
            let interactions = data.previous_interactions_within_mid_study_survey_period + 1;
            if interactions == INTERACTIONS_BEFORE_SURVEY {
                data.mid_study_survey_fired = true;
                SurveyProgress::Fired
            } else {
                data.previous_interactions_within_mid_study_survey_period = interactions;
                SurveyProgress::Counted { interactions }
            }
        })?;

        match progress {
            SurveyProgress::Counted { interactions } => tracing::info!(
                "Awesome bar interactions within the mid-study survey period: {}",
                interactions
            ),
            SurveyProgress::Fired => {
                tracing::info!("Firing mid-study survey in {} seconds", self.delay.as_secs());
                let trigger = self.trigger.clone();
                let delay = self.delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = trigger.open(&MidStudySurvey::url()).await {
                        tracing::warn!("Failed to open mid-study survey: {}", err);
                    }
                });
            }
            _ => {}
        }
        Ok(progress)
    }
}
