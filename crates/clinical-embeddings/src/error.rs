//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
///
/// `InvalidInput` means the caller handed the encoder something
/// meaningless (empty text, empty pixels), which is an upstream
/// extraction bug.
/// `Encoder` and `Http` are infrastructure failures of the model itself;
/// they are surfaced to the caller and never retried here.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Empty or malformed input reached the encoder
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Encoder returned a vector of the wrong length for its pinned model
    #[error("Dimension mismatch from {encoder}: expected {expected}, got {actual}")]
    DimensionMismatch {
        encoder: String,
        expected: usize,
        actual: usize,
    },

    /// The embedding model itself failed (resource, timeout, bad response)
    #[error("Encoder failure: {0}")]
    Encoder(String),

    /// Transport error talking to a remote encoder
    #[error("Encoder HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
