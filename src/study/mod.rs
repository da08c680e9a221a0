//! Study enrollment and bookkeeping around the core.

mod branches;
mod error;
mod setup;
mod storage;
mod survey;

pub use branches::{branch_config, branch_configs, choose_variation, pick_weighted, BranchConfig};
pub use error::StudyError;
pub use setup::{
    end_study, setup_study, survey_url, was_eligible_at_first_run, StudyEnding, StudyInfo,
    StudySettings, StudyStatus, DEFAULT_EXPIRE_DAYS,
};
pub use storage::{StudyStateData, StudyStorage};
pub use survey::{LoggingSurveyTrigger, MidStudySurvey, SurveyProgress, SurveyTrigger, SURVEY_DELAY};
