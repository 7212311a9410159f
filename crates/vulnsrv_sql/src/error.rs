//! Error types for the SQL executor.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for executor operations.
pub type SqlResult<T> = Result<T, SqlError>;

/// Errors that can occur when submitting a statement.
#[derive(Debug, Error)]
pub enum SqlError {
    /// The engine rejected or failed the statement.
    ///
    /// Execution failures are data, not faults: the engine stays up and
    /// the next statement runs normally. The calling layer is
    /// responsible for user-facing reporting.
    #[error("statement execution failed: {message}")]
    Execution {
        /// The engine's failure description.
        message: String,
    },

    /// The executor thread has exited and can no longer serve commands.
    #[error("sql executor thread is gone")]
    Disconnected,

    /// No result arrived within the configured timeout.
    #[error("no result within {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The executor thread could not be spawned.
    #[error("failed to spawn sql executor thread: {0}")]
    Spawn(#[from] io::Error),
}

impl SqlError {
    /// Creates an execution failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Returns true if this is a captured engine failure rather than an
    /// executor fault.
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}
