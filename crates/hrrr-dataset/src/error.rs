//! Error types for dataset access and query evaluation.

use thiserror::Error;

use hrrr_common::time::TimeParseError;

/// Errors that can occur while opening a dataset or evaluating a query.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Failed to open an array in the store.
    #[error("failed to open array {name}: {reason}")]
    OpenFailed { name: String, reason: String },

    /// Failed to read array data.
    #[error("failed to read array data: {0}")]
    ReadFailed(String),

    /// A selected variable does not exist in the dataset.
    #[error("variable not found: {0}")]
    MissingVariable(String),

    /// A queried coordinate axis does not exist in the dataset.
    #[error("coordinate not found: {0}")]
    MissingCoordinate(String),

    /// An array's dimensions do not match what the query requires.
    #[error("dimension mismatch for {name}: {reason}")]
    DimensionMismatch { name: String, reason: String },

    /// The array holds a data type this crate cannot convert.
    #[error("unsupported data type for {name}: {dtype}")]
    UnsupportedDataType { name: String, dtype: String },

    /// A coordinate axis is not strictly monotonic.
    #[error("coordinate {0} is not strictly monotonic")]
    NonMonotonic(String),

    /// A query resolved to nothing.
    #[error("empty selection: {0}")]
    EmptySelection(String),

    /// The execution backend could not be set up or is unknown.
    #[error("execution error: {0}")]
    Exec(String),

    /// Time parsing error.
    #[error(transparent)]
    Time(#[from] TimeParseError),

    /// An underlying storage error.
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),

    /// A tabular conversion error.
    #[error(transparent)]
    Frame(#[from] polars::error::PolarsError),
}

impl DatasetError {
    /// Create an OpenFailed error.
    pub fn open_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
