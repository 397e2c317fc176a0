//! Error types for reference-index handling.

use thiserror::Error;

/// Errors that can occur while parsing a manifest or serving reads from it.
#[derive(Debug, Error)]
pub enum KerchunkError {
    /// Failed to read the manifest file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The manifest is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The manifest declares a version this crate does not understand.
    #[error("unsupported reference manifest version: {0}")]
    UnsupportedVersion(u64),

    /// A reference entry has an unexpected shape.
    #[error("invalid reference for key {key}: {reason}")]
    InvalidRef { key: String, reason: String },

    /// An inline `base64:` value failed to decode.
    #[error("invalid base64 payload for key {0}")]
    Base64(String),

    /// A reference target could not be mapped to a storage backend.
    #[error("unsupported reference target: {0}")]
    UnsupportedTarget(String),

    /// The remote object store reported an error.
    #[error("remote store error for {target}: {source}")]
    Remote {
        target: String,
        #[source]
        source: object_store::Error,
    },
}

impl KerchunkError {
    /// Create an InvalidRef error.
    pub fn invalid_ref(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRef {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a Remote error.
    pub fn remote(target: impl Into<String>, source: object_store::Error) -> Self {
        Self::Remote {
            target: target.into(),
            source,
        }
    }
}

impl From<KerchunkError> for zarrs_storage::StorageError {
    fn from(err: KerchunkError) -> Self {
        zarrs_storage::StorageError::Other(err.to_string())
    }
}

/// Result type for reference-index operations.
pub type Result<T> = std::result::Result<T, KerchunkError>;
