use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by every engine entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Referenced task, participation, user or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Set membership already (or not) present, duplicate participation, full task.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation is illegal in the current lifecycle or participation state.
    #[error("state violation: {0}")]
    StateViolation(String),

    /// Caller lacks the required publisher / participant / admin relationship.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed creation payload or patch.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Durable Store or Fast Cache failed or timed out. When returned after a
    /// lifecycle write, the write is committed and only side effects degraded.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Durable Store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{op} error: {message}")]
    Backend { op: &'static str, message: String },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("malformed document {key}: {message}")]
    Malformed { key: String, message: String },
}

impl StoreError {
    pub fn backend(op: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Backend {
            op,
            message: error.to_string(),
        }
    }

    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Fast Cache failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache {op} error: {message}")]
    Backend { op: &'static str, message: String },

    #[error("cache {0} timed out")]
    Timeout(&'static str),
}

impl CacheError {
    pub fn backend(op: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Backend {
            op,
            message: error.to_string(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

impl From<CacheError> for Error {
    fn from(error: CacheError) -> Self {
        Self::Unavailable(error.to_string())
    }
}
