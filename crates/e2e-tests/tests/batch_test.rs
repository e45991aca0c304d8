//! Folder ingestion: partial failure, cancellation, report ordering.

use pretty_assertions::assert_eq;

use clinical_ingest::{BatchOptions, FileResult};
use clinical_store::store::VectorStore;
use tokio_util::sync::CancellationToken;

use e2e_tests::TestHarness;

#[tokio::test]
async fn test_one_bad_file_does_not_sink_the_batch() {
    let harness = TestHarness::new();
    harness.write_report("patient_P001_a_report.txt", "Normal blood panel.");
    harness.write_report("patient_P001_b_corrupt.txt", "   \n\t  ");
    harness.write_report("patient_P001_c_report.txt", "MRI shows no abnormality.");
    // Unsupported extensions are skipped but still appear in the report.
    harness.write_report("archive.tar", "not a document");

    let report = harness
        .pipeline
        .ingest_folder(
            harness.dir(),
            &BatchOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.ingested(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_complete_success());
    assert_eq!(harness.store.len().await, 2);

    // The failed entry names the file and the reason.
    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.result, FileResult::Failed { .. }))
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].path.to_string_lossy().contains("b_corrupt"));

    // The tarball is accounted for without being treated as an error.
    let skipped: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| matches!(o.result, FileResult::Skipped { .. }))
        .collect();
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].path.to_string_lossy().contains("archive.tar"));
}

#[tokio::test]
async fn test_report_preserves_enumeration_order() {
    let harness = TestHarness::new();
    for name in ["patient_P001_3.txt", "patient_P001_1.txt", "patient_P001_2.txt"] {
        harness.write_report(name, "Visit note.");
    }

    let report = harness
        .pipeline
        .ingest_folder(
            harness.dir(),
            &BatchOptions {
                concurrency: 3,
                patient_override: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let names: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| o.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["patient_P001_1.txt", "patient_P001_2.txt", "patient_P001_3.txt"]
    );
}

#[tokio::test]
async fn test_pre_cancelled_run_stores_nothing() {
    let harness = TestHarness::new();
    for i in 0..4 {
        harness.write_report(&format!("patient_P001_{}.txt", i), "Visit note.");
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = harness
        .pipeline
        .ingest_folder(harness.dir(), &BatchOptions::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(report.cancelled(), 4);
    assert_eq!(report.ingested(), 0);
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_second_run_skips_everything_unchanged() {
    let harness = TestHarness::new();
    harness.write_report("patient_P001_a.txt", "Stable vitals.");
    harness.write_report("patient_P001_b.txt", "Improved mobility.");

    let options = BatchOptions::default();
    let cancel = CancellationToken::new();
    harness
        .pipeline
        .ingest_folder(harness.dir(), &options, &cancel)
        .await
        .unwrap();
    let second = harness
        .pipeline
        .ingest_folder(harness.dir(), &options, &cancel)
        .await
        .unwrap();

    assert_eq!(second.unchanged(), 2);
    assert_eq!(second.ingested(), 0);
    assert!(second.is_complete_success());
    assert_eq!(harness.store.len().await, 2);
}

#[tokio::test]
async fn test_batch_override_attributes_unlabeled_files() {
    let harness = TestHarness::new();
    harness.write_report("scan_summary.txt", "Imaging reviewed, no acute findings.");

    let report = harness
        .pipeline
        .ingest_folder(
            harness.dir(),
            &BatchOptions {
                concurrency: 2,
                patient_override: Some("P777".to_string()),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(report.is_complete_success());

    let record_id = match &report.outcomes[0].result {
        FileResult::Ingested { record_id } => record_id.clone(),
        other => panic!("expected ingested, got {:?}", other),
    };
    let stored = harness
        .store
        .fetch(clinical_types::Modality::Text, &record_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.patient_id, "P777");
}
