use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to load places: {0}")]
    Places(#[source] anyhow::Error),

    #[error("Failed to set up study: {0}")]
    Study(#[source] anyhow::Error),

    #[error("Failed to initialize model sync: {0}")]
    Sync(#[source] anyhow::Error),
}
