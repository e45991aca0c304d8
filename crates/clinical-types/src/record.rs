//! Clinical record types.
//!
//! A `ClinicalRecord` is the unit of storage and retrieval: one vectorized
//! artifact (a report or a medical image) for one patient, tagged with the
//! metadata used for filtering. Records are immutable after creation; the
//! only mutation is an upsert-overwrite under the same `record_id`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClinicalError;

/// Embedding dimension for text records (sentence-transformer space).
pub const TEXT_DIMENSION: usize = 768;

/// Embedding dimension for image records (CLIP vision space).
pub const IMAGE_DIMENSION: usize = 512;

/// The data type a vector represents.
///
/// Determines which encoder produced the vector, its dimensionality, and
/// which store collection it lives in. Vectors from different modalities
/// are never comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Text extracted from a document
    Text,
    /// Decoded medical image
    Image,
}

impl Modality {
    /// Embedding dimension required for this modality.
    pub fn dimension(&self) -> usize {
        match self {
            Modality::Text => TEXT_DIMENSION,
            Modality::Image => IMAGE_DIMENSION,
        }
    }

    /// Name of the store collection holding this modality's vectors.
    pub fn collection(&self) -> &'static str {
        match self {
            Modality::Text => "patient_reports",
            Modality::Image => "medical_images",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
        }
    }
}

/// A decoded image normalized for the image encoder: RGB8, row-major,
/// bounded to the processor's maximum dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved RGB bytes, `width * height * 3` long
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer, checking that the byte length matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ClinicalError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ClinicalError::InvalidInput(format!(
                "pixel buffer is {} bytes, expected {} for {}x{} RGB",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Whether the buffer holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A stored clinical artifact.
///
/// Created once per file by the ingestion pipeline. `record_id` is the
/// upsert key: re-ingesting the same file overwrites rather than appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecord {
    /// Stable identifier, deterministic from `source_path`
    pub record_id: String,

    /// Patient this artifact belongs to (drives per-patient filtering)
    pub patient_id: String,

    /// Which encoder produced the vector
    pub modality: Modality,

    /// Embedding vector; length must match `modality.dimension()` exactly
    pub vector: Vec<f32>,

    /// Original file location (provenance only, never re-parsed)
    pub source_path: String,

    /// Date of clinical relevance, when one could be extracted
    pub document_date: Option<NaiveDate>,

    /// Clinical category tag (cardiac, radiology, ...), when resolved
    pub category: Option<String>,

    /// Short extracted snippet for display (text modality only)
    pub raw_text_excerpt: Option<String>,

    /// SHA-256 of the source file bytes, used to detect changed content
    pub content_hash: String,

    /// When this record was ingested
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ingested_at: DateTime<Utc>,
}

impl ClinicalRecord {
    /// Assemble a record, enforcing the modality/dimension invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        record_id: String,
        patient_id: String,
        modality: Modality,
        vector: Vec<f32>,
        source_path: String,
        document_date: Option<NaiveDate>,
        category: Option<String>,
        raw_text_excerpt: Option<String>,
        content_hash: String,
    ) -> Result<Self, ClinicalError> {
        if vector.len() != modality.dimension() {
            return Err(ClinicalError::DimensionMismatch {
                modality,
                expected: modality.dimension(),
                actual: vector.len(),
            });
        }
        Ok(Self {
            record_id,
            patient_id,
            modality,
            vector,
            source_path,
            document_date,
            category,
            raw_text_excerpt,
            content_hash,
            ingested_at: Utc::now(),
        })
    }

    /// The store payload for this record (everything but the vector).
    pub fn payload(&self) -> RecordPayload {
        RecordPayload {
            record_id: self.record_id.clone(),
            patient_id: self.patient_id.clone(),
            modality: self.modality,
            source_path: self.source_path.clone(),
            document_date: self.document_date,
            category: self.category.clone(),
            raw_text_excerpt: self.raw_text_excerpt.clone(),
            content_hash: self.content_hash.clone(),
            ingested_at: self.ingested_at,
        }
    }
}

/// The metadata stored alongside a vector and returned by searches.
///
/// Mirrors `ClinicalRecord` minus the vector itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    /// Record identifier (also the store point id)
    pub record_id: String,
    /// Patient identifier
    pub patient_id: String,
    /// Vector modality
    pub modality: Modality,
    /// Original file location
    pub source_path: String,
    /// Date of clinical relevance
    pub document_date: Option<NaiveDate>,
    /// Clinical category tag
    pub category: Option<String>,
    /// Display snippet (text modality only)
    pub raw_text_excerpt: Option<String>,
    /// SHA-256 of the source bytes
    pub content_hash: String,
    /// Ingestion timestamp
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ingested_at: DateTime<Utc>,
}
