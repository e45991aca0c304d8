//! # clinical-extract
//!
//! Turns heterogeneous clinical files into exactly one of {structured text,
//! normalized pixel buffer} plus structured metadata.
//!
//! Two pieces:
//! - `metadata`: a deterministic, ordered rule table matching patient ids,
//!   dates, and clinical categories in filenames and content. Unresolved
//!   fields stay unset, never guessed.
//! - `processor`: extension-dispatched extraction for PDF, DOCX, TXT/MD,
//!   JSON, and common raster image formats. Unsupported formats and
//!   extraction failures are distinct, typed errors.

pub mod error;
pub mod metadata;
pub mod processor;

pub use error::ExtractError;
pub use metadata::{extract, extract_from_path};
pub use processor::{DocumentPayload, DocumentProcessor, Limits, ProcessedDocument};
