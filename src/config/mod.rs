//! Configuration module for Batch-Enrich
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use batch_enrich::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("enrich.toml")).unwrap();
//! println!("Pipeline will run {} workers", config.pipeline.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CheckpointConfig, Config, DatasetEntry, EnrichmentConfig, FieldEntry, FieldKind, OutputConfig,
    PipelineConfig, RateLimitConfig, RetryConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
