//! Batch-Enrich: a resumable, rate-limited enrichment pipeline
//!
//! This crate feeds records from JSON input files through an external enrichment call,
//! collecting structured results and checkpointing progress so that long batch runs can
//! resume after an interruption without redoing finished work.

pub mod checkpoint;
pub mod config;
pub mod enrich;
pub mod output;
pub mod pipeline;
pub mod state;

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] enrich::EnrichError),

    #[error("Failed to read {path}: {source}")]
    InputRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    InputParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Work queue closed before the producer finished")]
    QueueClosed,

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Checkpoint persistence errors
///
/// Only write-side failures surface as errors; a checkpoint that cannot be read falls back
/// to a fresh state.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to create checkpoint directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to replace checkpoint {path}: {source}")]
    Rename {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Checkpoint task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use checkpoint::CheckpointStore;
pub use config::Config;
pub use enrich::{EnrichContext, EnrichedRecord, Enricher};
pub use pipeline::{run_enrichment, Pipeline, PipelineReport};
pub use state::{ProcessingState, QueueMessage, WorkItem};
