use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("study state lock poisoned")]
    StatePoisoned,

    #[error("unknown variation '{0}'")]
    UnknownVariation(String),
}
