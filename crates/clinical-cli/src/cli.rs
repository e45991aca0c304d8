//! CLI argument parsing for the clinical memory tool.

use clap::{Parser, Subcommand, ValueEnum};

use clinical_retrieval::QueryScope;

/// Clinical Memory
///
/// Ingests patient documents and medical images into a vector store and
/// answers natural-language questions about a patient's history.
#[derive(Parser, Debug)]
#[command(name = "clinical-memory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/clinical-memory/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which collections a query searches.
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ScopeArg {
    /// Text reports only
    #[default]
    Text,
    /// Medical images only
    Image,
    /// Both collections
    All,
}

impl From<ScopeArg> for QueryScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Text => QueryScope::Text,
            ScopeArg::Image => QueryScope::Image,
            ScopeArg::All => QueryScope::All,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a single document or image
    Ingest {
        /// File to ingest
        path: String,

        /// Patient id, overriding any found in the file
        #[arg(short, long)]
        patient: Option<String>,
    },

    /// Ingest every supported file in a folder
    IngestFolder {
        /// Directory to walk recursively
        dir: String,

        /// Patient id applied to every file
        #[arg(short, long)]
        patient: Option<String>,

        /// Files processed at once (default from config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Ask a natural-language question
    Query {
        /// The question text
        text: String,

        /// Restrict to one patient
        #[arg(short, long)]
        patient: Option<String>,

        /// Restrict to a clinical category (cardiac, radiology, ...)
        #[arg(long)]
        category: Option<String>,

        /// Earliest document date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Latest document date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Collections to search
        #[arg(long, value_enum, default_value_t = ScopeArg::Text)]
        scope: ScopeArg,

        /// Maximum results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Show a patient's records, most recent first
    Timeline {
        /// Patient id
        patient: String,

        /// Maximum entries
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Remove a record from the store
    Delete {
        /// Record id to remove
        record_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_ingest_with_patient() {
        let cli = Cli::parse_from(["clinical-memory", "ingest", "report.pdf", "-p", "P001"]);
        match cli.command {
            Commands::Ingest { path, patient } => {
                assert_eq!(path, "report.pdf");
                assert_eq!(patient, Some("P001".to_string()));
            }
            _ => panic!("Expected Ingest command"),
        }
    }

    #[test]
    fn test_cli_ingest_folder_with_concurrency() {
        let cli = Cli::parse_from([
            "clinical-memory",
            "ingest-folder",
            "/data/records",
            "--concurrency",
            "8",
        ]);
        match cli.command {
            Commands::IngestFolder {
                dir, concurrency, ..
            } => {
                assert_eq!(dir, "/data/records");
                assert_eq!(concurrency, Some(8));
            }
            _ => panic!("Expected IngestFolder command"),
        }
    }

    #[test]
    fn test_cli_query_defaults() {
        let cli = Cli::parse_from(["clinical-memory", "query", "chest pain history"]);
        match cli.command {
            Commands::Query {
                text, top_k, scope, ..
            } => {
                assert_eq!(text, "chest pain history");
                assert_eq!(top_k, 5);
                assert!(matches!(scope, ScopeArg::Text));
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_cli_query_with_filters() {
        let cli = Cli::parse_from([
            "clinical-memory",
            "query",
            "imaging findings",
            "--patient",
            "P001",
            "--category",
            "radiology",
            "--from",
            "2023-01-01",
            "--to",
            "2023-12-31",
            "--scope",
            "all",
            "-k",
            "10",
        ]);
        match cli.command {
            Commands::Query {
                patient,
                category,
                from,
                to,
                scope,
                top_k,
                ..
            } => {
                assert_eq!(patient, Some("P001".to_string()));
                assert_eq!(category, Some("radiology".to_string()));
                assert_eq!(from, Some("2023-01-01".to_string()));
                assert_eq!(to, Some("2023-12-31".to_string()));
                assert!(matches!(scope, ScopeArg::All));
                assert_eq!(top_k, 10);
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_cli_timeline() {
        let cli = Cli::parse_from(["clinical-memory", "timeline", "P001", "--limit", "50"]);
        match cli.command {
            Commands::Timeline { patient, limit } => {
                assert_eq!(patient, "P001");
                assert_eq!(limit, 50);
            }
            _ => panic!("Expected Timeline command"),
        }
    }

    #[test]
    fn test_cli_delete() {
        let cli = Cli::parse_from(["clinical-memory", "delete", "abc-123"]);
        assert!(matches!(cli.command, Commands::Delete { .. }));
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::parse_from([
            "clinical-memory",
            "--config",
            "/etc/clinical.toml",
            "timeline",
            "P001",
        ]);
        assert_eq!(cli.config, Some("/etc/clinical.toml".to_string()));
    }
}
