//! Error type returned by every engine operation.

use db::DbError;
use notifier::NotifierError;
use queue_core::InvalidStatus;
use storage::StorageError;

/// Failures surfaced to transport adapters.
///
/// Missing jobs are not errors; they show up as `false` or `None`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),

    #[error(transparent)]
    Notifier(#[from] NotifierError),

    #[error("render storage: {0}")]
    RenderStore(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Status code a transport adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::InvalidStatus(_) => 400,
            _ => 500,
        }
    }
}
