//! Retrieval engine.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info};

use clinical_embeddings::TextEncoder;
use clinical_store::{RecordFilter, ScoredRecord, VectorStore};
use clinical_types::record::IMAGE_DIMENSION;
use clinical_types::{Modality, RecordPayload};

use crate::error::QueryError;
use crate::query::{QueryOutcome, QueryRequest, QueryStatus};
use crate::rank::rank;

/// Executes queries against the store.
///
/// Text search always works. Image search needs the optional cross-modal
/// text encoder, a second text tower that embeds into the 512-dim image
/// space; without one, image-scoped queries fail with
/// `CrossModalUnavailable` rather than comparing incompatible vectors.
pub struct RetrievalEngine {
    text_encoder: Arc<dyn TextEncoder>,
    cross_modal_encoder: Option<Arc<dyn TextEncoder>>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalEngine {
    pub fn new(text_encoder: Arc<dyn TextEncoder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            text_encoder,
            cross_modal_encoder: None,
            store,
        }
    }

    pub fn with_cross_modal(mut self, encoder: Arc<dyn TextEncoder>) -> Self {
        self.cross_modal_encoder = Some(encoder);
        self
    }

    /// Run one query: embed, filtered search per scoped collection,
    /// dedup, rank, truncate.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryOutcome, QueryError> {
        if request.text.trim().is_empty() {
            return Err(QueryError::InvalidQuery(
                "query text is empty".to_string(),
            ));
        }
        if request.top_k == 0 {
            return Err(QueryError::InvalidQuery("top_k must be positive".to_string()));
        }

        let filter = request.filter();
        let mut hits: Vec<ScoredRecord> = Vec::new();

        if request.scope.includes_text() {
            let embedding = self.text_encoder.embed_text(&request.text).await?;
            let text_hits = self
                .store
                .search(Modality::Text, &embedding.values, &filter, request.top_k)
                .await?;
            debug!(hits = text_hits.len(), "Text collection searched");
            hits.extend(text_hits);
        }

        if request.scope.includes_image() {
            let encoder = self.cross_modal_text_encoder()?;
            let embedding = encoder.embed_text(&request.text).await?;
            let image_hits = self
                .store
                .search(Modality::Image, &embedding.values, &filter, request.top_k)
                .await?;
            debug!(hits = image_hits.len(), "Image collection searched");
            hits.extend(image_hits);
        }

        let ranked = rank(hits, request.top_k);
        let status = if ranked.is_empty() {
            QueryStatus::NoResults
        } else {
            QueryStatus::Ok
        };
        info!(
            hits = ranked.len(),
            status = ?status,
            patient_id = request.patient_id.as_deref().unwrap_or("*"),
            "Query complete"
        );
        Ok(QueryOutcome {
            status,
            hits: ranked,
        })
    }

    /// A patient's records across both collections, most recent first.
    ///
    /// Undated records sort after dated ones, ordered by ingestion time.
    pub async fn timeline(
        &self,
        patient_id: &str,
        limit: usize,
    ) -> Result<Vec<RecordPayload>, QueryError> {
        if patient_id.trim().is_empty() {
            return Err(QueryError::InvalidQuery(
                "patient id is empty".to_string(),
            ));
        }
        let filter = RecordFilter::for_patient(patient_id);
        let mut entries = self.store.scroll(Modality::Text, &filter, limit).await?;
        entries.extend(self.store.scroll(Modality::Image, &filter, limit).await?);

        entries.sort_by(|a, b| {
            match (a.document_date, b.document_date) {
                (Some(da), Some(db)) => db.cmp(&da),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => b.ingested_at.cmp(&a.ingested_at),
            }
            .then_with(|| a.record_id.cmp(&b.record_id))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    fn cross_modal_text_encoder(&self) -> Result<&Arc<dyn TextEncoder>, QueryError> {
        match &self.cross_modal_encoder {
            Some(encoder) if encoder.info().dimension == IMAGE_DIMENSION => Ok(encoder),
            _ => Err(QueryError::CrossModalUnavailable),
        }
    }
}
