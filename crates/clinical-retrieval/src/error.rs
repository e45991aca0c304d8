//! Query error types.

use thiserror::Error;

use clinical_embeddings::EmbeddingError;
use clinical_store::StoreError;

/// Errors from query execution.
///
/// "No matching records" is not among them; that is a successful query
/// with an empty result and is reported through `QueryStatus`.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The request itself is malformed (empty text, zero top_k)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Query embedding failed
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Store lookup failed
    #[error("Store lookup failed: {0}")]
    Store(#[from] StoreError),

    /// Image search was requested but no cross-modal text encoder is
    /// configured to embed text into the image space
    #[error("Image search unavailable: no cross-modal text encoder configured")]
    CrossModalUnavailable,
}
