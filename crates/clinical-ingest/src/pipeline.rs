//! Single-file ingestion pipeline.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use clinical_embeddings::{Embedding, ImageEncoder, TextEncoder};
use clinical_extract::{DocumentPayload, DocumentProcessor, ProcessedDocument};
use clinical_store::VectorStore;
use clinical_types::ids::{content_hash, record_id_for_source};
use clinical_types::{ClinicalRecord, Modality, RecordMetadata};

use crate::error::IngestError;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A record was written (new or overwriting a stale one)
    Ingested {
        record_id: String,
        modality: Modality,
    },
    /// Source bytes match the stored record, nothing written
    Unchanged { record_id: String },
}

impl IngestOutcome {
    pub fn record_id(&self) -> &str {
        match self {
            IngestOutcome::Ingested { record_id, .. } => record_id,
            IngestOutcome::Unchanged { record_id } => record_id,
        }
    }
}

/// Extract -> metadata -> embed -> upsert for one file at a time.
///
/// Stateless apart from its collaborators; safe to share across tasks.
pub struct IngestPipeline {
    processor: DocumentProcessor,
    text_encoder: Arc<dyn TextEncoder>,
    image_encoder: Arc<dyn ImageEncoder>,
    store: Arc<dyn VectorStore>,
    skip_unchanged: bool,
}

impl IngestPipeline {
    pub fn new(
        text_encoder: Arc<dyn TextEncoder>,
        image_encoder: Arc<dyn ImageEncoder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            processor: DocumentProcessor::new(),
            text_encoder,
            image_encoder,
            store,
            skip_unchanged: true,
        }
    }

    /// Re-embed and overwrite even when the source bytes are unchanged.
    pub fn with_skip_unchanged(mut self, skip_unchanged: bool) -> Self {
        self.skip_unchanged = skip_unchanged;
        self
    }

    /// Ingest one file into the store.
    ///
    /// `patient_override` wins over any patient id found in the filename
    /// or content. Without either, the file is rejected rather than
    /// stored unattributed.
    pub async fn ingest_file(
        &self,
        path: &Path,
        patient_override: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let source_path = path.display().to_string();
        let record_id = record_id_for_source(&source_path);

        let bytes = tokio::fs::read(path).await?;
        let hash = content_hash(&bytes);
        drop(bytes);

        if self.skip_unchanged {
            if let Some(modality) = DocumentProcessor::classify(path) {
                if let Some(stored) = self.store.fetch(modality, &record_id).await? {
                    if stored.content_hash == hash {
                        debug!(path = %source_path, record_id = %record_id, "Source unchanged, skipping");
                        return Ok(IngestOutcome::Unchanged { record_id });
                    }
                }
            }
        }

        // PDF and image decoding are CPU-bound; keep them off the runtime.
        let processor = self.processor.clone();
        let owned_path = path.to_path_buf();
        let processed: ProcessedDocument =
            tokio::task::spawn_blocking(move || processor.process(&owned_path)).await??;

        let metadata = processed.metadata.clone();
        let patient_id = self.resolve_patient(&source_path, &metadata, patient_override)?;
        let modality = processed.modality();

        let (embedding, excerpt) = self.embed(processed).await?;

        let record = ClinicalRecord::new(
            record_id.clone(),
            patient_id,
            modality,
            embedding.values,
            source_path.clone(),
            metadata.document_date,
            metadata.category,
            excerpt,
            hash,
        )?;
        self.store.upsert(&record).await?;

        info!(
            path = %source_path,
            record_id = %record_id,
            modality = %modality,
            patient_id = %record.patient_id,
            "Ingested record"
        );
        Ok(IngestOutcome::Ingested {
            record_id,
            modality,
        })
    }

    fn resolve_patient(
        &self,
        source_path: &str,
        metadata: &RecordMetadata,
        patient_override: Option<&str>,
    ) -> Result<String, IngestError> {
        if let Some(explicit) = patient_override {
            return Ok(explicit.to_string());
        }
        metadata
            .patient_id
            .clone()
            .ok_or_else(|| IngestError::MissingPatientId {
                path: source_path.to_string(),
            })
    }

    async fn embed(
        &self,
        processed: ProcessedDocument,
    ) -> Result<(Embedding, Option<String>), IngestError> {
        match processed.payload {
            DocumentPayload::Text { text, excerpt } => {
                let embedding = self.text_encoder.embed_text(&text).await?;
                Ok((embedding, Some(excerpt)))
            }
            DocumentPayload::Image(pixels) => {
                let embedding = self.image_encoder.embed_image(&pixels).await?;
                Ok((embedding, None))
            }
        }
    }
}
