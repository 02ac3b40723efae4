//! Error types for the interpreter seam and the worker itself.

use thiserror::Error;

use crate::execution::summarize_trace;

/// Failures coming back from the embedded environment.
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("failed to start interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("interpreter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed interpreter message: {0}")]
    Protocol(String),

    #[error("interpreter is not loaded")]
    NotLoaded,

    #[error("interpreter exited")]
    Closed,

    /// The interpreter raised; carries the full textual trace.
    #[error("{0}")]
    Raised(String),
}

impl EnvError {
    /// Full textual trace for raised errors, the display text otherwise.
    pub fn trace(&self) -> String {
        match self {
            EnvError::Raised(trace) => trace.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("interpreter failed to load: {0}")]
    Load(#[source] EnvError),

    #[error("program execution failed: {summary}")]
    Execution {
        summary: String,
        #[source]
        source: EnvError,
    },

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("location model is read-only")]
    ReadOnly,
}

impl WorkerError {
    /// One human-readable line suitable for a `status` message.
    pub fn summary(&self) -> String {
        match self {
            WorkerError::Load(source) | WorkerError::Env(source) => summarize_trace(&source.trace()),
            WorkerError::Execution { summary, .. } => summary.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
