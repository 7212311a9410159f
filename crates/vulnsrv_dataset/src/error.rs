//! Error types for dataset descriptions.

use thiserror::Error;

/// Result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Errors that can occur while loading a dataset description.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The description blob is not valid JSON or has the wrong shape.
    #[error("dataset parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A table declares no columns, which cannot be rendered as DDL.
    #[error("table {name} declares no columns")]
    EmptyStructure {
        /// Name of the offending table.
        name: String,
    },
}

impl DatasetError {
    /// Creates an empty-structure error.
    pub fn empty_structure(name: impl Into<String>) -> Self {
        Self::EmptyStructure { name: name.into() }
    }
}
