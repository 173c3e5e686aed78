use thiserror::Error;

use crate::models::UserId;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("No such user in model: {0}")]
    NoSuchUser(UserId),

    #[error("Recommender not ready: no model has been built yet")]
    NotReady,

    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    #[error("Extraction failure: {0}")]
    Extraction(String),

    #[error("Model build error: {0}")]
    ModelBuild(String),

    #[error("Store I/O error: {0}")]
    StoreIo(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Errors that abort a rebuild attempt without touching the active model.
    pub fn is_rebuild_failure(&self) -> bool {
        matches!(
            self,
            AppError::Extraction(_)
                | AppError::ModelBuild(_)
                | AppError::StoreIo(_)
                | AppError::RebuildInProgress
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StoreIo(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}
