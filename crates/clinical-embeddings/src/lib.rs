//! # clinical-embeddings
//!
//! Embedding generation contracts for the clinical memory system.
//!
//! Text and images are embedded by two independent opaque encoders exposed
//! as capability traits. The text space (768 dimensions) and the image
//! space (512 dimensions) are never mixed; each encoder pins its model
//! identity so that a model change is visible as a version change rather
//! than silently incomparable vectors.
//!
//! ## Implementations
//! - `HttpTextEncoder` / `HttpImageEncoder`: remote inference endpoints
//! - `StubTextEncoder` / `StubImageEncoder`: deterministic local vectors
//!   for tests and offline development

pub mod encoder;
pub mod error;
pub mod http;
pub mod stub;

pub use encoder::{Embedding, EncoderInfo, ImageEncoder, TextEncoder};
pub use error::EmbeddingError;
pub use http::{HttpImageEncoder, HttpTextEncoder};
pub use stub::{StubImageEncoder, StubTextEncoder};
