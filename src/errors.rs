use thiserror::Error;

/// Error type for snapshot storage and analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerfSnapError {
    #[error("snapshot not found: {0}")]
    NotFound(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("analysis cancelled: {0}")]
    Cancelled(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("snapshot already exists: {0}")]
    AlreadyExists(String),
}

pub type Result<T> = std::result::Result<T, PerfSnapError>;

impl PerfSnapError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::NotFound(msg.into())
    }

    pub fn parse<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::ParseError(msg.into())
    }

    pub fn insufficient_data<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::InsufficientData(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::StorageError(msg.into())
    }

    pub fn cancelled<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::Cancelled(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::InvalidInput(msg.into())
    }

    pub fn already_exists<T: Into<String>>(msg: T) -> Self {
        PerfSnapError::AlreadyExists(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PerfSnapError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PerfSnapError::Cancelled(_))
    }
}
