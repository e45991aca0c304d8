//! Clinical Memory CLI
//!
//! Ingests patient documents and medical images into a vector store and
//! answers natural-language questions about a patient's history.
//!
//! # Usage
//!
//! ```bash
//! clinical-memory ingest report.pdf --patient P001
//! clinical-memory ingest-folder /data/records
//! clinical-memory query "cardiac history" --patient P001
//! clinical-memory timeline P001
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/clinical-memory/config.toml)
//! 3. Environment variables (CLINICAL_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use clinical_cli::{
    handle_delete, handle_ingest, handle_ingest_folder, handle_query, handle_timeline,
    init_logging, load_settings, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Ingest { path, patient } => {
            handle_ingest(&settings, &path, patient.as_deref()).await?;
        }
        Commands::IngestFolder {
            dir,
            patient,
            concurrency,
        } => {
            handle_ingest_folder(&settings, &dir, patient.as_deref(), concurrency).await?;
        }
        Commands::Query {
            text,
            patient,
            category,
            from,
            to,
            scope,
            top_k,
        } => {
            handle_query(
                &settings,
                &text,
                patient.as_deref(),
                category.as_deref(),
                from.as_deref(),
                to.as_deref(),
                scope.into(),
                top_k,
            )
            .await?;
        }
        Commands::Timeline { patient, limit } => {
            handle_timeline(&settings, &patient, limit).await?;
        }
        Commands::Delete { record_id } => {
            handle_delete(&settings, &record_id).await?;
        }
    }

    Ok(())
}
