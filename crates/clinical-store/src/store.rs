//! Vector store trait and query types.

use async_trait::async_trait;
use chrono::NaiveDate;

use clinical_types::{ClinicalRecord, Modality, RecordPayload};

use crate::error::StoreError;

/// Metadata constraints applied before similarity ranking.
///
/// All present fields must match (logical AND). A record with no
/// `document_date` never matches a date-constrained filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Restrict to a single patient
    pub patient_id: Option<String>,
    /// Restrict to a clinical category
    pub category: Option<String>,
    /// Inclusive document date window (start, end)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl RecordFilter {
    /// Filter scoped to one patient.
    pub fn for_patient(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.patient_id.is_none() && self.category.is_none() && self.date_range.is_none()
    }

    /// Evaluate this filter against a stored payload.
    ///
    /// This is the reference semantics; the Qdrant implementation pushes
    /// the same conditions down as payload filters.
    pub fn matches(&self, payload: &RecordPayload) -> bool {
        if let Some(patient_id) = &self.patient_id {
            if &payload.patient_id != patient_id {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if payload.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some((start, end)) = &self.date_range {
            match payload.document_date {
                Some(date) => {
                    if date < *start || date > *end {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// A search hit: stored payload plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// Record identifier (deduplication key)
    pub record_id: String,
    /// Cosine similarity against the query vector, higher is better
    pub score: f32,
    /// Stored metadata
    pub payload: RecordPayload,
}

/// Persistent vector storage split into per-modality collections.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create missing collections and payload indexes. Idempotent.
    async fn ensure_collections(&self) -> Result<(), StoreError>;

    /// Insert or overwrite a record, keyed by `record_id`.
    ///
    /// Re-ingesting the same source replaces the stored point; it never
    /// creates a duplicate.
    async fn upsert(&self, record: &ClinicalRecord) -> Result<(), StoreError>;

    /// Fetch a stored payload by id, or None if absent.
    async fn fetch(
        &self,
        modality: Modality,
        record_id: &str,
    ) -> Result<Option<RecordPayload>, StoreError>;

    /// Similarity search within one modality's collection.
    ///
    /// Returns at most `limit` hits, best score first. Filters are
    /// applied before ranking, not as a post-filter on the top hits.
    async fn search(
        &self,
        modality: Modality,
        vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Enumerate stored payloads matching a filter, without similarity.
    async fn scroll(
        &self,
        modality: Modality,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<RecordPayload>, StoreError>;

    /// Remove a record from both collections. Returns true if any
    /// collection held it.
    async fn delete(&self, record_id: &str) -> Result<bool, StoreError>;
}
