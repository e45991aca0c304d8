//! Store error types.

use thiserror::Error;

/// Errors from vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport error talking to the store
    #[error("Store HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("Store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The store answered with a shape we cannot interpret
    #[error("Unexpected store response: {0}")]
    InvalidResponse(String),

    /// Vector length does not match the collection's configured dimension
    #[error("Dimension mismatch for {collection}: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Payload (de)serialization failure
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
