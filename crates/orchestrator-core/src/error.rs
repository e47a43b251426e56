//! Unified error types for task validation and storage.

/// Errors returned by [`crate::validator`] when a submission is rejected.
///
/// Each variant corresponds to one of the ordered checks in the submission
/// validator; the caller turns this into a 400 response.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("id must be a non-empty string")]
    MissingId,

    #[error("type must be a non-empty string")]
    MissingType,

    #[error("duration_ms must be a non-negative integer")]
    InvalidDuration,

    #[error("task id already exists: {0}")]
    DuplicateId(String),

    #[error("dependency ids must be non-empty strings")]
    InvalidDependency,

    #[error("task cannot depend on itself: {0}")]
    SelfDependency(String),

    #[error("dependency not found: {0}")]
    UnknownDependency(String),

    #[error("submission would create a cycle through: {0}")]
    CycleDetected(String),
}

/// Errors from the [`crate::store::TaskStore`] trait.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}
