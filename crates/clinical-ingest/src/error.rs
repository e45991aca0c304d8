//! Ingestion error types.

use thiserror::Error;

use clinical_embeddings::EmbeddingError;
use clinical_extract::ExtractError;
use clinical_store::StoreError;
use clinical_types::ClinicalError;

/// Errors from the ingestion pipeline.
///
/// Each variant keeps its originating stage visible so batch reports can
/// say where a file died without parsing message strings.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File could not be read or normalized
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Encoder rejected the input or failed
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store write failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Record assembly failed (dimension invariant)
    #[error("Record error: {0}")]
    Record(#[from] ClinicalError),

    /// No patient id from metadata extraction and no override given
    #[error("No patient id for {path}: not found in filename or content, pass one explicitly")]
    MissingPatientId { path: String },

    /// Filesystem error outside the extraction stage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background processing task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
