//! Configuration loading for the clinical memory system.
//!
//! Layered precedence: built-in defaults, then the config file at
//! `~/.config/clinical-memory/config.toml`, then `CLINICAL_*` environment
//! variables. The resulting `Settings` struct is constructed once at
//! startup, validated, and threaded through components by parameter;
//! nothing reads the process environment from deep call paths.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ClinicalError;

/// Application settings.
///
/// Keys are flat so that environment overrides map one-to-one:
/// `store_url` is overridden by `CLINICAL_STORE_URL`, and so on.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Vector store endpoint URL
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Vector store access credential (from CLINICAL_STORE_API_KEY)
    #[serde(default)]
    pub store_api_key: Option<SecretString>,

    /// Vector store request timeout in seconds
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// Text encoder inference endpoint URL
    #[serde(default)]
    pub text_encoder_url: String,

    /// Pinned text encoder model identifier; changing it invalidates
    /// previously stored text vectors
    #[serde(default = "default_text_encoder_model")]
    pub text_encoder_model: String,

    /// Image encoder inference endpoint URL
    #[serde(default)]
    pub image_encoder_url: String,

    /// Pinned image encoder model identifier
    #[serde(default = "default_image_encoder_model")]
    pub image_encoder_model: String,

    /// Optional cross-modal text encoder endpoint (512-dim text tower).
    /// Without it, image-space search requires an image query.
    #[serde(default)]
    pub cross_modal_encoder_url: Option<String>,

    /// Bounded worker pool size for batch ingestion
    #[serde(default = "default_ingest_concurrency")]
    pub ingest_concurrency: usize,

    /// Skip re-embedding files whose content hash is unchanged
    #[serde(default = "default_skip_unchanged")]
    pub skip_unchanged: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_store_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_store_timeout_secs() -> u64 {
    60
}

fn default_text_encoder_model() -> String {
    "sentence-transformers/all-mpnet-base-v2".to_string()
}

fn default_image_encoder_model() -> String {
    "openai/clip-vit-base-patch32".to_string()
}

fn default_ingest_concurrency() -> usize {
    4
}

fn default_skip_unchanged() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            store_api_key: None,
            store_timeout_secs: default_store_timeout_secs(),
            text_encoder_url: String::new(),
            text_encoder_model: default_text_encoder_model(),
            image_encoder_url: String::new(),
            image_encoder_model: default_image_encoder_model(),
            cross_modal_encoder_url: None,
            ingest_concurrency: default_ingest_concurrency(),
            skip_unchanged: default_skip_unchanged(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/clinical-memory/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CLINICAL_*)
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ClinicalError> {
        let config_dir = ProjectDirs::from("", "", "clinical-memory")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("store_url", default_store_url())
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .set_default("store_timeout_secs", default_store_timeout_secs() as i64)
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .set_default("text_encoder_model", default_text_encoder_model())
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .set_default("image_encoder_model", default_image_encoder_model())
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .set_default("ingest_concurrency", default_ingest_concurrency() as i64)
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .set_default("skip_unchanged", default_skip_unchanged())
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ClinicalError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Flat keys, so no separator: CLINICAL_STORE_URL -> store_url
        builder = builder.add_source(Environment::with_prefix("CLINICAL").try_parsing(true));

        let config = builder
            .build()
            .map_err(|e| ClinicalError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ClinicalError::Config(e.to_string()))
    }

    /// Validate the settings needed before any pipeline operation may run.
    ///
    /// A missing endpoint or malformed value is fatal at startup; callers
    /// must not construct pipelines from unvalidated settings.
    pub fn validate(&self) -> Result<(), ClinicalError> {
        check_url("store_url", &self.store_url)?;
        check_url("text_encoder_url", &self.text_encoder_url)?;
        check_url("image_encoder_url", &self.image_encoder_url)?;
        if let Some(url) = &self.cross_modal_encoder_url {
            check_url("cross_modal_encoder_url", url)?;
        }
        if self.ingest_concurrency == 0 {
            return Err(ClinicalError::Config(
                "ingest_concurrency must be at least 1".to_string(),
            ));
        }
        if self.store_timeout_secs == 0 {
            return Err(ClinicalError::Config(
                "store_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> Result<(), ClinicalError> {
    if value.trim().is_empty() {
        return Err(ClinicalError::Config(format!("{} is not set", name)));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ClinicalError::Config(format!(
            "{} must be an http(s) URL, got {:?}",
            name, value
        )));
    }
    Ok(())
}
