//! End-to-end test infrastructure for clinical-memory.
//!
//! Provides a shared TestHarness and fixture helpers for E2E tests
//! covering the full ingest-to-query pipeline over the in-memory store
//! and the deterministic stub encoders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clinical_embeddings::{StubImageEncoder, StubTextEncoder};
use clinical_ingest::IngestPipeline;
use clinical_retrieval::RetrievalEngine;
use clinical_store::MemoryStore;
use clinical_types::record::IMAGE_DIMENSION;

/// Shared test harness for E2E tests.
///
/// Wires the pipeline and engine over one `MemoryStore` so records
/// ingested through the pipeline are visible to queries, and keeps a
/// temp directory alive for fixture files.
pub struct TestHarness {
    /// Keeps the fixture dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub store: Arc<MemoryStore>,
    pub pipeline: Arc<IngestPipeline>,
    pub engine: RetrievalEngine,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(MemoryStore::new());
        let text_encoder = Arc::new(StubTextEncoder::new());

        let pipeline = Arc::new(IngestPipeline::new(
            text_encoder.clone(),
            Arc::new(StubImageEncoder::new()),
            store.clone(),
        ));
        let engine = RetrievalEngine::new(text_encoder, store.clone())
            .with_cross_modal(Arc::new(StubTextEncoder::with_dimension(IMAGE_DIMENSION)));

        Self {
            _temp_dir: temp_dir,
            store,
            pipeline,
            engine,
        }
    }

    /// Root of the fixture directory.
    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Write a text fixture and return its path.
    pub fn write_report(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir().join(name);
        std::fs::write(&path, content).expect("Failed to write fixture");
        path
    }

    /// Write a small PNG fixture and return its path.
    ///
    /// The fill color makes each scan's pixel content (and therefore its
    /// stub embedding) distinct.
    pub fn write_scan(&self, name: &str, fill: [u8; 3]) -> PathBuf {
        let path = self.dir().join(name);
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb(fill));
        img.save(&path).expect("Failed to write image fixture");
        path
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
