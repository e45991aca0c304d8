//! # clinical-cli
//!
//! Command-line interface for the clinical memory system.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, ScopeArg};
pub use commands::{
    handle_delete, handle_ingest, handle_ingest_folder, handle_query, handle_timeline,
    init_logging, load_settings,
};
