use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DusqlError {
    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {kind} value: {value:?}")]
    InvalidUnit { kind: &'static str, value: String },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),
}

impl DusqlError {
    /// Whether the error was caused by the caller's input rather than the store
    /// or the filesystem
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DusqlError::InvalidRequest(_)
                | DusqlError::Json(_)
                | DusqlError::InvalidUnit { .. }
                | DusqlError::UnknownUser(_)
                | DusqlError::UnknownGroup(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DusqlError>;
