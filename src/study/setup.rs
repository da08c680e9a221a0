//! Study enrollment: eligibility, branch assignment, expiry and endings.
//!
//! Runs once at startup. Eligibility is decided on the first run and the
//! answer cached; an ineligible client ends the study on its first run only.
//! Every testing override marks outgoing telemetry as test data.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::branches::{branch_config, choose_variation, BranchConfig};
use super::error::StudyError;
use super::storage::StudyStorage;
use crate::privacy::PrivacyGate;

pub const DEFAULT_EXPIRE_DAYS: i64 = 28;

const SURVEY_BASE_URL: &str = "https://qsurvey.mozilla.com/s3/URL-bar-satisfaction-survey/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudyEnding {
    Ineligible,
    Expired,
    UserDisable,
    IndividualOptOut,
}

impl StudyEnding {
    pub fn name(self) -> &'static str {
        match self {
            StudyEnding::Ineligible => "ineligible",
            StudyEnding::Expired => "expired",
            StudyEnding::UserDisable => "user-disable",
            StudyEnding::IndividualOptOut => "individual-opt-out",
        }
    }

    /// Pages opened when the study ends this way.
    pub fn urls(self) -> Vec<String> {
        match self {
            StudyEnding::Ineligible => Vec::new(),
            _ => vec![survey_url(self.name())],
        }
    }
}

pub fn survey_url(reason: &str) -> String {
    format!("{}?reason={}", SURVEY_BASE_URL, reason)
}

#[derive(Debug, Clone, Default)]
pub struct StudySettings {
    pub variation_override: Option<String>,
    pub first_run_override: Option<DateTime<Utc>>,
    pub expired_override: Option<bool>,
    pub expire_days: Option<i64>,
    pub model_url_overridden: bool,
    /// Data-collection permission granted by the user.
    pub data_collection_allowed: bool,
}

impl StudySettings {
    pub fn expire_days(&self) -> i64 {
        self.expire_days.unwrap_or(DEFAULT_EXPIRE_DAYS).max(1)
    }

    pub fn has_testing_overrides(&self) -> bool {
        self.variation_override.is_some()
            || self.first_run_override.is_some()
            || self.expired_override.is_some()
            || self.model_url_overridden
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyInfo {
    pub variation: BranchConfig,
    pub first_run_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub mid_study_survey_starts_at: DateTime<Utc>,
    pub is_first_run: bool,
    pub testing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StudyStatus {
    Active(StudyInfo),
    Ended { ending: StudyEnding, urls: Vec<String> },
}

async fn is_currently_eligible(settings: &StudySettings, privacy: &dyn PrivacyGate) -> bool {
    if privacy.permanent_private_browsing().await {
        tracing::info!("Permanent private browsing, exiting study");
        return false;
    }
    settings.data_collection_allowed
}

/// Cached first-run eligibility. Only a positive answer short-circuits; a
/// negative one is recomputed.
pub async fn was_eligible_at_first_run(
    storage: &StudyStorage,
    settings: &StudySettings,
    privacy: &dyn PrivacyGate,
) -> Result<bool, StudyError> {
    if storage.snapshot()?.allowed_enroll_on_first_run == Some(true) {
        return Ok(true);
    }
    let allowed = is_currently_eligible(settings, privacy).await;
    storage.update(|data| data.allowed_enroll_on_first_run = Some(allowed))?;
    Ok(allowed)
}

fn resolve_variation(
    storage: &StudyStorage,
    settings: &StudySettings,
) -> Result<BranchConfig, StudyError> {
    if let Some(name) = &settings.variation_override {
        tracing::info!(
            "Note: The branch/variation is overridden for testing purposes (\"{}\")",
            name
        );
        return branch_config(name).ok_or_else(|| StudyError::UnknownVariation(name.clone()));
    }

    if let Some(name) = storage.snapshot()?.variation {
        match branch_config(&name) {
            Some(branch) => return Ok(branch),
            None => tracing::warn!("Stored variation '{}' is unknown, reassigning", name),
        }
    }

    let branch = choose_variation();
    storage.update(|data| data.variation = Some(branch.name.clone()))?;
    tracing::info!("Assigned study variation '{}'", branch.name);
    Ok(branch)
}

pub fn end_study(storage: &StudyStorage, ending: StudyEnding) -> Result<StudyStatus, StudyError> {
    storage.update(|data| data.ending = Some(ending))?;
    tracing::info!("Study ended: {}", ending.name());
    Ok(StudyStatus::Ended {
        ending,
        urls: ending.urls(),
    })
}

pub async fn setup_study(
    storage: &StudyStorage,
    settings: &StudySettings,
    privacy: &dyn PrivacyGate,
    now: DateTime<Utc>,
) -> Result<StudyStatus, StudyError> {
    if let Some(ending) = storage.snapshot()?.ending {
        return Ok(StudyStatus::Ended {
            ending,
            urls: ending.urls(),
        });
    }

    let eligible = was_eligible_at_first_run(storage, settings, privacy).await?;

    let stored_first_run = storage.snapshot()?.first_run_timestamp;
    let is_first_run = stored_first_run.is_none();
    if is_first_run && !eligible {
        return end_study(storage, StudyEnding::Ineligible);
    }

    let first_run_at = match (settings.first_run_override, stored_first_run) {
        (Some(overridden), _) => {
            tracing::info!(
                "Note: The firstRunTimestamp property is set to \"{}\" for testing purposes",
                overridden
            );
            overridden
        }
        (None, Some(stored)) => stored,
        (None, None) => {
            storage.update(|data| data.first_run_timestamp = Some(now))?;
            now
        }
    };

    let variation = resolve_variation(storage, settings)?;

    let lifetime = Duration::days(settings.expire_days());
    let expires_at = first_run_at + lifetime;
    let expired = match settings.expired_override {
        Some(expired) => {
            tracing::info!("Note: The expired flag is set to \"{}\" for testing purposes", expired);
            expired
        }
        None => now >= expires_at,
    };
    if expired {
        return end_study(storage, StudyEnding::Expired);
    }

    Ok(StudyStatus::Active(StudyInfo {
        variation,
        first_run_at,
        expires_at,
        mid_study_survey_starts_at: first_run_at + lifetime / 2,
        is_first_run,
        testing: settings.has_testing_overrides(),
    }))
}
