use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::{AppPaths, AppSettings, ConfigService};
use crate::core::security::{init_session_token, SessionToken};
use crate::interaction::InteractionObserver;
use crate::optimization::{FrecencyOptimizer, SharedWeights};
use crate::places::PlacesFrecency;
use crate::privacy::PrivacyFlags;
use crate::study::{
    setup_study, LoggingSurveyTrigger, MidStudySurvey, StudyInfo, StudyStatus, StudyStorage,
};
use crate::sync::{
    ArchiveTelemetrySink, HttpTelemetrySink, ModelSynchronizer, TelemetrySink, TelemetryTransports,
};

pub mod error;

use error::InitializationError;

/// Components that only exist while the study is active.
pub struct StudyRuntime {
    pub info: StudyInfo,
    pub synchronizer: Arc<ModelSynchronizer>,
    pub observer: Arc<InteractionObserver>,
}

/// Shared state behind every route and the sync task.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: AppSettings,
    pub session_token: SessionToken,
    pub study: StudyStatus,
    pub privacy: Arc<PrivacyFlags>,
    pub weights: SharedWeights,
    pub places: Arc<PlacesFrecency>,
    pub runtime: Option<StudyRuntime>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Loads configuration from the environment and the data directory,
    /// then builds the state.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?
            .with_env_overrides();
        let session_token = init_session_token(&paths.user_data_dir);

        Self::build(paths, settings, session_token).await
    }

    /// Wires the components:
    /// 1. places table and shared weights
    /// 2. study setup (eligibility, variation, expiry)
    /// 3. telemetry transports and the model synchronizer
    /// 4. the optimizer and the interaction observer
    pub async fn build(
        paths: Arc<AppPaths>,
        settings: AppSettings,
        session_token: SessionToken,
    ) -> Result<Arc<Self>, InitializationError> {
        let places_path = settings
            .places_path
            .clone()
            .unwrap_or_else(|| paths.places_path.clone());
        let places = Arc::new(
            PlacesFrecency::load(&places_path).map_err(|e| InitializationError::Places(e.into()))?,
        );
        tracing::info!("Loaded {} places from {}", places.len(), places_path.display());

        let weights = SharedWeights::default();
        let privacy = Arc::new(PrivacyFlags::new(settings.permanent_private_browsing));

        let storage = StudyStorage::new(paths.study_state_path.clone());
        let study = setup_study(&storage, &settings.study, privacy.as_ref(), Utc::now())
            .await
            .map_err(|e| InitializationError::Study(e.into()))?;

        let runtime = match &study {
            StudyStatus::Active(info) => {
                tracing::info!(
                    variation = %info.variation.name,
                    testing = info.testing,
                    "Study active until {}",
                    info.expires_at
                );
                Some(Self::build_runtime(
                    &paths, &settings, info, &storage, &weights, &places, &privacy,
                )?)
            }
            StudyStatus::Ended { ending, urls } => {
                tracing::info!(?urls, "Study has ended ({})", ending.name());
                None
            }
        };

        Ok(Arc::new(AppState {
            paths,
            settings,
            session_token,
            study,
            privacy,
            weights,
            places,
            runtime,
            started_at: Utc::now(),
        }))
    }

    fn build_runtime(
        paths: &AppPaths,
        settings: &AppSettings,
        info: &StudyInfo,
        storage: &StudyStorage,
        weights: &SharedWeights,
        places: &Arc<PlacesFrecency>,
        privacy: &Arc<PrivacyFlags>,
    ) -> Result<StudyRuntime, InitializationError> {
        let mut transports: Vec<Arc<dyn TelemetrySink>> = Vec::new();
        if settings.telemetry.archive {
            transports.push(Arc::new(ArchiveTelemetrySink::new(
                paths.telemetry_archive_path.clone(),
            )));
        }
        if settings.telemetry.send {
            if let Some(endpoint) = &settings.telemetry.endpoint {
                let sink = HttpTelemetrySink::new(endpoint.clone(), settings.sync.request_timeout)
                    .map_err(|e| InitializationError::Sync(e.into()))?;
                transports.push(Arc::new(sink));
            }
        }
        let telemetry = TelemetryTransports::new(transports);
        if telemetry.is_empty() {
            tracing::warn!("No telemetry transport configured, reports are dropped");
        }

        let mut sync_settings = settings.sync.clone();
        sync_settings.testing = info.testing;
        let synchronizer = Arc::new(
            ModelSynchronizer::new(
                info.variation.clone(),
                sync_settings,
                weights.clone(),
                places.clone(),
                Arc::new(telemetry),
            )
            .map_err(|e| InitializationError::Sync(e.into()))?,
        );

        let optimizer = Arc::new(FrecencyOptimizer::new(
            weights.clone(),
            places.clone(),
            synchronizer.clone(),
            settings.epsilon,
        ));
        let survey = Arc::new(MidStudySurvey::new(
            storage.clone(),
            Arc::new(LoggingSurveyTrigger),
            info.mid_study_survey_starts_at,
        ));
        let observer = Arc::new(InteractionObserver::new(
            privacy.clone(),
            optimizer,
            Some(survey),
        ));

        Ok(StudyRuntime {
            info: info.clone(),
            synchronizer,
            observer,
        })
    }
}
