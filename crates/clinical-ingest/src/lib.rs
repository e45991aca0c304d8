//! # clinical-ingest
//!
//! Ingestion pipeline for the clinical memory system.
//!
//! A single file flows extract -> metadata -> embed -> upsert, producing
//! exactly one stored record keyed by a deterministic id derived from the
//! source path. Folder ingestion runs that pipeline over a bounded number
//! of files at a time; one bad file fails alone, and cancellation stops
//! scheduling new files without corrupting records already stored.

pub mod batch;
pub mod error;
pub mod pipeline;

pub use batch::{BatchOptions, BatchReport, FileOutcome, FileResult};
pub use error::IngestError;
pub use pipeline::{IngestOutcome, IngestPipeline};
