use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Batch-Enrich
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub enrichment: EnrichmentConfig,
    pub output: OutputConfig,
    #[serde(rename = "dataset", default)]
    pub datasets: Vec<DatasetEntry>,
}

/// Queue and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of work items waiting in the queue
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of concurrent worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Number of processed items between checkpoint saves
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Whether to load an existing checkpoint at startup
    #[serde(default = "default_true")]
    pub resume: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            checkpoint_interval: default_checkpoint_interval(),
            resume: true,
        }
    }
}

/// Checkpoint location
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding the checkpoint file
    #[serde(default = "default_checkpoint_dir")]
    pub directory: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: default_checkpoint_dir(),
        }
    }
}

/// Global request rate and concurrency limits
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Operations allowed per period
    #[serde(rename = "max-requests", default = "default_max_requests")]
    pub max_requests: u32,

    /// Length of the rate limit period in seconds
    #[serde(rename = "period-secs", default = "default_period_secs")]
    pub period_secs: f64,

    /// Maximum number of external calls in flight, if capped
    #[serde(rename = "max-concurrent", default)]
    pub max_concurrent: Option<usize>,
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            period_secs: default_period_secs(),
            max_concurrent: None,
        }
    }
}

/// Retry-with-backoff policy for the external call
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per item, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay (milliseconds)
    #[serde(rename = "max-jitter-ms", default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

/// External enrichment endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Chat-completion endpoint URL
    pub endpoint: String,

    /// Model name sent with every request
    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Per-call timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Optional system message sent ahead of each record
    #[serde(default)]
    pub instructions: Option<String>,

    /// Optional JSON document passed to every call as base data
    #[serde(rename = "base-data-path", default)]
    pub base_data_path: Option<PathBuf>,

    /// Declared shape of the enrichment result
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One declared field of the enrichment result
#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub kind: FieldKind,
}

/// Value shapes a result field may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    List,
    Object,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON array file receiving enriched records
    #[serde(rename = "results-path")]
    pub results_path: PathBuf,
}

/// A labelled directory of input files
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEntry {
    /// Label used in checkpoint keys (`<label>:<file>`)
    pub label: String,

    /// Directory scanned for `.json` input files
    pub directory: PathBuf,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_workers() -> usize {
    10
}

fn default_checkpoint_interval() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_max_requests() -> u32 {
    10
}

fn default_period_secs() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_jitter_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    500
}

fn default_temperature() -> f64 {
    0.01
}
