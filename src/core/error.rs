use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Reference integrity violation: {0}")]
    ReferenceIntegrity(String),

    #[error("Invalid numeric input: '{0}'")]
    InvalidNumber(String),

    #[error("Save superseded by a later edit to the same field")]
    Superseded,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl<T> From<std::sync::PoisonError<T>> for SyncError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
