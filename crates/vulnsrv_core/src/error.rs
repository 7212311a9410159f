//! Error types for the vulnsrv core.

use thiserror::Error;
use vulnsrv_dataset::DatasetError;
use vulnsrv_sql::SqlError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The SQL executor reported a failure.
    #[error("sql error: {0}")]
    Sql(#[from] SqlError),

    /// The dataset description could not be rendered into statements.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl CoreError {
    /// Returns true if this wraps a captured statement failure, the
    /// recoverable kind the calling layer reports to the user.
    pub fn is_statement_failure(&self) -> bool {
        matches!(self, Self::Sql(err) if err.is_execution())
    }
}
