//! Command handlers: wire settings into components and run one command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use clinical_embeddings::{HttpImageEncoder, HttpTextEncoder, TextEncoder};
use clinical_ingest::{BatchOptions, FileResult, IngestOutcome, IngestPipeline};
use clinical_retrieval::{QueryRequest, QueryScope, QueryStatus, RetrievalEngine};
use clinical_store::{QdrantStore, ScoredRecord, VectorStore};
use clinical_types::record::IMAGE_DIMENSION;
use clinical_types::Settings;

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load and validate settings, applying CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    settings
        .validate()
        .context("Configuration is incomplete or invalid")?;
    Ok(settings)
}

struct Components {
    pipeline: Arc<IngestPipeline>,
    engine: RetrievalEngine,
    store: Arc<QdrantStore>,
}

/// Build the store, the encoders, and the pipeline/engine over them.
///
/// Collections are created up front so every later operation can assume
/// they exist.
async fn build(settings: &Settings) -> Result<Components> {
    let timeout = Duration::from_secs(settings.store_timeout_secs);

    let store = Arc::new(
        QdrantStore::new(&settings.store_url, settings.store_api_key.as_ref(), timeout)
            .context("Failed to build vector store client")?,
    );
    store
        .ensure_collections()
        .await
        .context("Failed to prepare vector store collections")?;

    let text_encoder: Arc<dyn TextEncoder> = Arc::new(
        HttpTextEncoder::new(
            &settings.text_encoder_url,
            &settings.text_encoder_model,
            None,
            timeout,
        )
        .context("Failed to build text encoder client")?,
    );
    let image_encoder = Arc::new(
        HttpImageEncoder::new(
            &settings.image_encoder_url,
            &settings.image_encoder_model,
            None,
            timeout,
        )
        .context("Failed to build image encoder client")?,
    );

    let pipeline = Arc::new(
        IngestPipeline::new(
            Arc::clone(&text_encoder),
            image_encoder,
            store.clone() as Arc<dyn VectorStore>,
        )
        .with_skip_unchanged(settings.skip_unchanged),
    );

    let mut engine = RetrievalEngine::new(text_encoder, store.clone() as Arc<dyn VectorStore>);
    if let Some(url) = &settings.cross_modal_encoder_url {
        // The cross-modal tower shares the image model's embedding space.
        let cross = HttpTextEncoder::with_dimension(
            url,
            &settings.image_encoder_model,
            None,
            timeout,
            IMAGE_DIMENSION,
        )
        .context("Failed to build cross-modal encoder client")?;
        engine = engine.with_cross_modal(Arc::new(cross));
    }

    Ok(Components {
        pipeline,
        engine,
        store,
    })
}

pub async fn handle_ingest(
    settings: &Settings,
    path: &str,
    patient: Option<&str>,
) -> Result<()> {
    let components = build(settings).await?;
    let outcome = components
        .pipeline
        .ingest_file(Path::new(path), patient)
        .await
        .with_context(|| format!("Failed to ingest {}", path))?;
    match outcome {
        IngestOutcome::Ingested {
            record_id,
            modality,
        } => println!("Ingested {} as {} record {}", path, modality, record_id),
        IngestOutcome::Unchanged { record_id } => {
            println!("Unchanged: {} already stored as {}", path, record_id)
        }
    }
    Ok(())
}

pub async fn handle_ingest_folder(
    settings: &Settings,
    dir: &str,
    patient: Option<&str>,
    concurrency: Option<usize>,
) -> Result<()> {
    let components = build(settings).await?;
    let options = BatchOptions {
        concurrency: concurrency.unwrap_or(settings.ingest_concurrency),
        patient_override: patient.map(str::to_string),
    };

    // Ctrl-C stops scheduling new files; in-flight files finish.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight files");
            signal_cancel.cancel();
        }
    });

    let report = components
        .pipeline
        .ingest_folder(Path::new(dir), &options, &cancel)
        .await
        .with_context(|| format!("Failed to ingest folder {}", dir))?;

    for outcome in &report.outcomes {
        match &outcome.result {
            FileResult::Failed { reason } => {
                println!("FAILED   {}: {}", outcome.path.display(), reason)
            }
            FileResult::Cancelled => println!("CANCELLED {}", outcome.path.display()),
            FileResult::Skipped { reason } => {
                println!("skipped  {} ({})", outcome.path.display(), reason)
            }
            FileResult::Ingested { .. } => println!("ingested {}", outcome.path.display()),
            FileResult::Unchanged { .. } => println!("unchanged {}", outcome.path.display()),
        }
    }
    println!(
        "{} files: {} ingested, {} unchanged, {} skipped, {} failed, {} cancelled",
        report.total(),
        report.ingested(),
        report.unchanged(),
        report.skipped(),
        report.failed(),
        report.cancelled()
    );

    if report.failed() > 0 {
        bail!("{} of {} files failed", report.failed(), report.total());
    }
    if report.cancelled() > 0 {
        bail!("run cancelled with {} files unprocessed", report.cancelled());
    }
    Ok(())
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("{} must be YYYY-MM-DD, got {:?}", name, value))
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_query(
    settings: &Settings,
    text: &str,
    patient: Option<&str>,
    category: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    scope: QueryScope,
    top_k: usize,
) -> Result<()> {
    let mut request = QueryRequest::new(text).with_scope(scope).with_top_k(top_k);
    if let Some(patient) = patient {
        request = request.for_patient(patient);
    }
    if let Some(category) = category {
        request = request.with_category(category);
    }
    if from.is_some() || to.is_some() {
        let start = parse_date("--from", from.unwrap_or("1900-01-01"))?;
        let end = match to {
            Some(to) => parse_date("--to", to)?,
            None => chrono::Utc::now().date_naive(),
        };
        request = request.with_date_range(start, end);
    }

    let components = build(settings).await?;
    let outcome = components
        .engine
        .query(&request)
        .await
        .context("Query failed")?;

    match outcome.status {
        QueryStatus::NoResults => println!("No matching records."),
        QueryStatus::Ok => {
            for (i, hit) in outcome.hits.iter().enumerate() {
                print_hit(i + 1, hit);
            }
        }
    }
    Ok(())
}

fn print_hit(position: usize, hit: &ScoredRecord) {
    let date = hit
        .payload
        .document_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "undated".to_string());
    let category = hit.payload.category.as_deref().unwrap_or("-");
    println!(
        "{:>2}. [{:.3}] {} {} {} patient={}",
        position, hit.score, date, category, hit.payload.source_path, hit.payload.patient_id
    );
    if let Some(excerpt) = &hit.payload.raw_text_excerpt {
        let line = excerpt.split_whitespace().collect::<Vec<_>>().join(" ");
        println!("      {}", line);
    }
}

pub async fn handle_timeline(settings: &Settings, patient: &str, limit: usize) -> Result<()> {
    let components = build(settings).await?;
    let entries = components
        .engine
        .timeline(patient, limit)
        .await
        .context("Timeline lookup failed")?;

    if entries.is_empty() {
        println!("No records for patient {}.", patient);
        return Ok(());
    }
    for entry in &entries {
        let date = entry
            .document_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undated".to_string());
        println!(
            "{} {:>6} {} ({})",
            date,
            entry.modality,
            entry.source_path,
            entry.category.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn handle_delete(settings: &Settings, record_id: &str) -> Result<()> {
    let components = build(settings).await?;
    let found = components
        .store
        .delete(record_id)
        .await
        .context("Delete failed")?;
    if found {
        println!("Deleted record {}", record_id);
    } else {
        println!("No record with id {}", record_id);
    }
    Ok(())
}
