//! Extraction error types.

use thiserror::Error;

/// Errors that can occur while normalizing a file.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// File extension is not a supported text or image format
    #[error("Unsupported file format: {extension:?}")]
    UnsupportedFormat { extension: String },

    /// A text-bearing file yielded no extractable text
    #[error("No text could be extracted from {path}")]
    NoText { path: String },

    /// Image file could not be decoded
    #[error("Failed to decode image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    /// File exceeds the processing size limit
    #[error("File {path} is {bytes} bytes, over the {limit} byte limit")]
    TooLarge { path: String, bytes: u64, limit: u64 },

    /// Structurally broken document (bad PDF, DOCX archive, JSON, ...)
    #[error("Malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
