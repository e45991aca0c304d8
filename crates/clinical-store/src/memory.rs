//! In-memory vector store.
//!
//! Same observable semantics as `QdrantStore` (upsert-by-id, filtered
//! cosine search, scroll, cross-collection delete) with no external
//! process. Used by tests and offline development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use clinical_types::{ClinicalRecord, Modality, RecordPayload};

use crate::error::StoreError;
use crate::store::{RecordFilter, ScoredRecord, VectorStore};

#[derive(Default)]
struct Collections {
    text: HashMap<String, (Vec<f32>, RecordPayload)>,
    image: HashMap<String, (Vec<f32>, RecordPayload)>,
}

impl Collections {
    fn for_modality(&self, modality: Modality) -> &HashMap<String, (Vec<f32>, RecordPayload)> {
        match modality {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
        }
    }

    fn for_modality_mut(
        &mut self,
        modality: Modality,
    ) -> &mut HashMap<String, (Vec<f32>, RecordPayload)> {
        match modality {
            Modality::Text => &mut self.text,
            Modality::Image => &mut self.image,
        }
    }
}

/// In-process `VectorStore` implementation.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across both collections.
    pub async fn len(&self) -> usize {
        let collections = self.collections.read().await;
        collections.text.len() + collections.image.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Dot product; equals cosine similarity for unit-length vectors.
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collections(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, record: &ClinicalRecord) -> Result<(), StoreError> {
        if record.vector.len() != record.modality.dimension() {
            return Err(StoreError::DimensionMismatch {
                collection: record.modality.collection().to_string(),
                expected: record.modality.dimension(),
                actual: record.vector.len(),
            });
        }
        let mut collections = self.collections.write().await;
        collections.for_modality_mut(record.modality).insert(
            record.record_id.clone(),
            (record.vector.clone(), record.payload()),
        );
        Ok(())
    }

    async fn fetch(
        &self,
        modality: Modality,
        record_id: &str,
    ) -> Result<Option<RecordPayload>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .for_modality(modality)
            .get(record_id)
            .map(|(_, payload)| payload.clone()))
    }

    async fn search(
        &self,
        modality: Modality,
        vector: &[f32],
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        if vector.len() != modality.dimension() {
            return Err(StoreError::DimensionMismatch {
                collection: modality.collection().to_string(),
                expected: modality.dimension(),
                actual: vector.len(),
            });
        }
        let collections = self.collections.read().await;
        let mut hits: Vec<ScoredRecord> = collections
            .for_modality(modality)
            .values()
            .filter(|(_, payload)| filter.matches(payload))
            .map(|(stored, payload)| ScoredRecord {
                record_id: payload.record_id.clone(),
                score: similarity(vector, stored),
                payload: payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        modality: Modality,
        filter: &RecordFilter,
        limit: usize,
    ) -> Result<Vec<RecordPayload>, StoreError> {
        let collections = self.collections.read().await;
        let mut payloads: Vec<RecordPayload> = collections
            .for_modality(modality)
            .values()
            .filter(|(_, payload)| filter.matches(payload))
            .map(|(_, payload)| payload.clone())
            .collect();
        // Stable order so repeated scrolls agree.
        payloads.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        payloads.truncate(limit);
        Ok(payloads)
    }

    async fn delete(&self, record_id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let from_text = collections.text.remove(record_id).is_some();
        let from_image = collections.image.remove(record_id).is_some();
        Ok(from_text || from_image)
    }
}
