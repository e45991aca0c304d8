//! Folder ingestion with bounded concurrency.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use clinical_extract::DocumentProcessor;

use crate::error::IngestError;
use crate::pipeline::{IngestOutcome, IngestPipeline};

/// Knobs for a folder run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Files processed at once
    pub concurrency: usize,
    /// Patient id applied to every file, overriding extraction
    pub patient_override: Option<String>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            patient_override: None,
        }
    }
}

/// Per-file result within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    Ingested { record_id: String },
    Unchanged { record_id: String },
    /// Not a recognized document or image format; never processed
    Skipped { reason: String },
    /// Processing failed; the rest of the batch continued
    Failed { reason: String },
    /// Never started because the run was cancelled
    Cancelled,
}

/// One file's entry in the batch report, in enumeration order.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: FileResult,
}

/// Summary of a folder run. `outcomes` preserves enumeration order
/// regardless of completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn ingested(&self) -> usize {
        self.count(|r| matches!(r, FileResult::Ingested { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|r| matches!(r, FileResult::Unchanged { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, FileResult::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, FileResult::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|r| matches!(r, FileResult::Cancelled))
    }

    /// True when nothing failed and cancellation left nothing behind.
    /// Files skipped as unchanged or unsupported still count as success.
    pub fn is_complete_success(&self) -> bool {
        self.failed() == 0 && self.cancelled() == 0
    }

    fn count(&self, pred: impl Fn(&FileResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }
}

/// Every regular file under `dir`, recursively, in a stable sorted order.
///
/// Unsupported formats are kept in the listing so the batch report
/// accounts for them; they become `Skipped` outcomes, not failures.
pub fn enumerate_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            IngestError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
            }))
        })?;
        if entry.file_type().is_file() {
            paths.push(entry.path().to_path_buf());
        }
    }
    Ok(paths)
}

impl IngestPipeline {
    /// Ingest every supported file under `dir`.
    ///
    /// At most `options.concurrency` files are in flight at once. A
    /// failing file is recorded and the batch moves on. Cancelling the
    /// token lets in-flight files finish but starts no new ones; the
    /// report marks unstarted files `Cancelled`.
    pub async fn ingest_folder(
        &self,
        dir: &Path,
        options: &BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, IngestError> {
        let paths = enumerate_files(dir)?;
        info!(dir = %dir.display(), files = paths.len(), concurrency = options.concurrency, "Starting folder ingestion");

        let concurrency = options.concurrency.max(1);
        let mut indexed: Vec<(usize, FileOutcome)> = stream::iter(paths.into_iter().enumerate())
            .map(|(index, path)| {
                let pipeline = self;
                let cancel = cancel.clone();
                let patient = options.patient_override.clone();
                async move {
                    let result = if !DocumentProcessor::is_supported(&path) {
                        FileResult::Skipped {
                            reason: match path.extension() {
                                Some(ext) => format!("unrecognized extension {:?}", ext),
                                None => "no file extension".to_string(),
                            },
                        }
                    } else if cancel.is_cancelled() {
                        FileResult::Cancelled
                    } else {
                        match pipeline.ingest_file(&path, patient.as_deref()).await {
                            Ok(IngestOutcome::Ingested { record_id, .. }) => {
                                FileResult::Ingested { record_id }
                            }
                            Ok(IngestOutcome::Unchanged { record_id }) => {
                                FileResult::Unchanged { record_id }
                            }
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "File failed, continuing batch");
                                FileResult::Failed {
                                    reason: e.to_string(),
                                }
                            }
                        }
                    };
                    (index, FileOutcome { path, result })
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let report = BatchReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        info!(
            total = report.total(),
            ingested = report.ingested(),
            unchanged = report.unchanged(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "Folder ingestion finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use clinical_embeddings::{StubImageEncoder, StubTextEncoder};
    use clinical_store::MemoryStore;

    fn pipeline(store: Arc<MemoryStore>) -> Arc<IngestPipeline> {
        Arc::new(IngestPipeline::new(
            Arc::new(StubTextEncoder::new()),
            Arc::new(StubImageEncoder::new()),
            store,
        ))
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_enumeration_is_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b_note.txt", "x");
        write(dir.path(), "a_note.txt", "x");
        write(dir.path(), "ignore.tar", "x");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "c_note.md", "x");

        let paths = enumerate_files(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["a_note.txt", "b_note.txt", "ignore.tar", "c_note.md"]
        );
    }

    #[tokio::test]
    async fn test_unsupported_files_are_reported_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "patient_P001_note.txt", "Follow-up in two weeks.");
        write(dir.path(), "backup.tar", "not a document");

        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());
        let report = pipeline
            .ingest_folder(
                dir.path(),
                &BatchOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // Every file seen appears in the report; the tarball is skipped,
        // not failed, and does not spoil the run.
        assert_eq!(report.total(), 2);
        assert_eq!(report.ingested(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 0);
        assert!(report.is_complete_success());
        assert_eq!(store.len().await, 1);

        let skipped = report
            .outcomes
            .iter()
            .find(|o| matches!(o.result, FileResult::Skipped { .. }))
            .unwrap();
        assert!(skipped.path.to_string_lossy().contains("backup.tar"));
    }

    #[tokio::test]
    async fn test_batch_partial_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "patient_P001_a.txt", "Blood panel normal.");
        // Whitespace-only content fails extraction.
        write(dir.path(), "patient_P001_b.txt", "   \n  ");
        write(dir.path(), "patient_P001_c.txt", "MRI scheduled.");

        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());
        let report = pipeline
            .ingest_folder(
                dir.path(),
                &BatchOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.ingested(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_complete_success());
        assert_eq!(store.len().await, 2);

        // Report order follows enumeration order.
        assert!(report.outcomes[1]
            .path
            .to_string_lossy()
            .contains("patient_P001_b"));
        assert!(matches!(
            report.outcomes[1].result,
            FileResult::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_batch_marks_unstarted_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(
                dir.path(),
                &format!("patient_P001_{}.txt", i),
                "Routine note.",
            );
        }

        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline
            .ingest_folder(dir.path(), &BatchOptions::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(report.cancelled(), 5);
        assert_eq!(report.ingested(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_rerun_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "patient_P001_a.txt", "Stable vitals.");
        write(dir.path(), "patient_P001_b.txt", "Discharged home.");

        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());
        let options = BatchOptions::default();
        let cancel = CancellationToken::new();

        let first = pipeline
            .ingest_folder(dir.path(), &options, &cancel)
            .await
            .unwrap();
        assert_eq!(first.ingested(), 2);

        let second = pipeline
            .ingest_folder(dir.path(), &options, &cancel)
            .await
            .unwrap();
        assert_eq!(second.unchanged(), 2);
        assert_eq!(second.ingested(), 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_batch_patient_override_applies_to_all() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scan_notes.txt", "Imaging reviewed.");

        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());
        let options = BatchOptions {
            concurrency: 2,
            patient_override: Some("P042".to_string()),
        };
        let report = pipeline
            .ingest_folder(dir.path(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_complete_success());
        assert_eq!(store.len().await, 1);
    }
}
