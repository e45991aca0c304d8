//! # clinical-types
//!
//! Shared domain types for the clinical memory system.
//!
//! This crate defines the core data structures used throughout the system:
//! - Records: Vectorized clinical artifacts (reports, scans) with provenance
//! - Metadata: Structured fields extracted from filenames and content
//! - Settings: Layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use clinical_types::{ClinicalRecord, Modality};
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod metadata;
pub mod record;

pub use config::Settings;
pub use error::ClinicalError;
pub use metadata::RecordMetadata;
pub use record::{ClinicalRecord, Modality, PixelBuffer, RecordPayload};
