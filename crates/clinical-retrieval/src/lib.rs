//! # clinical-retrieval
//!
//! Query engine for the clinical memory system.
//!
//! Natural-language queries are embedded, searched against the store
//! with metadata filters pushed down, then deduplicated and ranked:
//! similarity first, document recency as the tie-break, undated records
//! last. An empty result set is an explicit status, never an error.

pub mod engine;
pub mod error;
pub mod query;
pub mod rank;

pub use engine::RetrievalEngine;
pub use error::QueryError;
pub use query::{QueryOutcome, QueryRequest, QueryScope, QueryStatus};
