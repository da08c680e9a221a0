use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StudyError;
use super::setup::StudyEnding;

/// Counters and assignments that survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStateData {
    pub variation: Option<String>,
    pub first_run_timestamp: Option<DateTime<Utc>>,
    pub allowed_enroll_on_first_run: Option<bool>,
    #[serde(default)]
    pub mid_study_survey_period_started: bool,
    #[serde(default)]
    pub mid_study_survey_fired: bool,
    #[serde(default)]
    pub previous_interactions_within_mid_study_survey_period: u32,
    pub ending: Option<StudyEnding>,
}

#[derive(Clone)]
pub struct StudyStorage {
    inner: Arc<Mutex<StudyStateData>>,
    state_path: PathBuf,
}

impl StudyStorage {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let data = load_state(&state_path).unwrap_or_default();
        Self {
            inner: Arc::new(Mutex::new(data)),
            state_path,
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("study_state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.state_path
    }

    pub fn snapshot(&self) -> Result<StudyStateData, StudyError> {
        let guard = self.inner.lock().map_err(|_| StudyError::StatePoisoned)?;
        Ok(guard.clone())
    }

    /// Applies `change` and persists the result.
    pub fn update<T>(&self, change: impl FnOnce(&mut StudyStateData) -> T) -> Result<T, StudyError> {
        let (result, data) = {
            let mut guard = self.inner.lock().map_err(|_| StudyError::StatePoisoned)?;
            let result = change(&mut guard);
            (result, guard.clone())
        };
        self.save_state(&data)?;
        Ok(result)
    }

    fn save_state(&self, data: &StudyStateData) -> Result<(), StudyError> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        fs::write(&self.state_path, contents)?;
        Ok(())
    }
}

fn load_state(path: &Path) -> Option<StudyStateData> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<StudyStateData>(&contents) {
        Ok(data) => Some(data),
        Err(err) => {
            tracing::warn!("Ignoring unreadable study state {}: {}", path.display(), err);
            None
        }
    }
}
