//! Error types for task construction and state transitions

use thiserror::Error;

use crate::task::TaskStatus;

/// Errors surfaced by task construction, validation, and transitions
///
/// All of these are synchronous, construction-time failures. Runtime
/// failures (a handler that fails, an unknown task type at dispatch) are
/// never errors; they travel as data inside a result.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task failed an invariant check
    #[error("invalid task created: {0}")]
    Validation(String),

    /// Payload or result data could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task type string is not in the recognized set
    #[error("task type '{0}' is not valid")]
    UnknownTaskType(String),

    /// Status may only move forward through the lifecycle
    #[error("cannot transition task from '{from}' to '{to}'")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

impl TaskError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        TaskError::Validation(msg.into())
    }
}
