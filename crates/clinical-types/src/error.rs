//! Error types shared across the clinical memory system.

use thiserror::Error;

use crate::record::Modality;

/// Unified error type for domain-level invariant violations.
#[derive(Debug, Error)]
pub enum ClinicalError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector length does not match the declared modality
    #[error("Dimension mismatch for {modality} record: expected {expected}, got {actual}")]
    DimensionMismatch {
        modality: Modality,
        expected: usize,
        actual: usize,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
