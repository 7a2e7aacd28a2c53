use thiserror::Error;

use crate::repositories::StoreError;
use crate::services::completion::CompletionError;

/// Engine-level failure taxonomy.
///
/// `Cancelled` and `StaleUpdate` are control-flow signals and never reach
/// the user. `Transport`/`Protocol` are caught at the session boundary and
/// converted into one synthetic assistant notice. `InvariantViolation` is
/// fatal to the current operation and propagates so the caller can trigger a
/// defensive reset.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed stream event: {0}")]
    Protocol(String),

    #[error("stream cancelled")]
    Cancelled,

    #[error("stale update from a superseded session")]
    StaleUpdate,

    #[error("message log invariant violated: {0}")]
    InvariantViolation(String),

    #[error("message not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CompletionError> for EngineError {
    fn from(value: CompletionError) -> Self {
        match value {
            CompletionError::Transport(message) => EngineError::Transport(message),
            CompletionError::Protocol(message) => EngineError::Protocol(message),
        }
    }
}
