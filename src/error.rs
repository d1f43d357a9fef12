//! Error taxonomy for the ingestion library.
//!
//! Library code returns the typed [`IngestError`]; the CLI boundary wraps it
//! with `anyhow` context. Pure phases never fail on well-formed data, so the
//! variants here cover only ingest, decode, storage, and lifecycle faults.

use uuid::Uuid;

/// Crate-wide result alias for fallible library operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Faults surfaced while ingesting, decoding, persisting, or processing an
/// upload.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The filename carried an extension outside the supported allow-list.
    #[error("unsupported file extension '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The file could not be decoded or parsed into a dataset.
    #[error("could not decode file: {reason}")]
    Decode { reason: String },

    /// No upload exists for the requested id.
    #[error("upload {id} not found")]
    UploadNotFound { id: Uuid },

    /// The upload has already been processed; processing is idempotent.
    #[error("upload {id} already processed")]
    AlreadyProcessed { id: Uuid },

    /// The upload exceeded the ingest size cap.
    #[error("file is too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// A persistence failure (filesystem I/O or JSON serialization).
    #[error("storage error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A failure encountered while reading, transforming, or inserting rows.
    /// The message is captured onto the upload and the error re-raised.
    #[error("processing failed: {reason}")]
    Processing { reason: String },
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Store(Box::new(err))
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Store(Box::new(err))
    }
}
