//! # clinical-store
//!
//! Vector store abstraction for the clinical memory system.
//!
//! Records live in two Qdrant collections split by embedding space:
//! `patient_reports` (768-dim text) and `medical_images` (512-dim image).
//! The `VectorStore` trait is the seam: the production implementation is
//! `QdrantStore` (REST), and `MemoryStore` provides the same semantics
//! in-process for tests and offline development.

pub mod error;
pub mod memory;
pub mod qdrant;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use store::{RecordFilter, ScoredRecord, VectorStore};
