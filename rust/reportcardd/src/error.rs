use thiserror::Error;

/// Failures surfaced by the roster, marks, and report services.
///
/// Every variant is recoverable: the IPC layer turns it into a single-line
/// status message and the daemon keeps reading requests.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    NotFound(String),

    /// The payload is diagnostic detail for the log, never shown to callers.
    #[error("store request failed")]
    RemoteIo(String),

    #[error("roll {0:?} contains no digits")]
    InvalidRollFormat(String),

    #[error("roll {0:?} is too large")]
    RollOutOfRange(String),

    #[error("sign in required")]
    Unauthenticated,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::DuplicateKey(_) => "duplicate_key",
            AppError::NotFound(_) => "not_found",
            AppError::RemoteIo(_) => "remote_io",
            AppError::InvalidRollFormat(_) | AppError::RollOutOfRange(_) => "invalid_roll_format",
            AppError::Unauthenticated => "unauthenticated",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::RemoteIo(format!("{e:#}"))
    }
}

pub type AppResult<T> = Result<T, AppError>;
