//! Enricher trait and error types
//!
//! The pipeline treats enrichment as an opaque, possibly slow, possibly failing async call.
//! Anything that can turn an input record into an `EnrichedRecord` plugs in here.

use crate::enrich::EnrichedRecord;
use crate::pipeline::RateLimiter;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by an enrichment call
///
/// Every variant counts as a transient failure and is subject to the retry policy.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Enrichment timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Result does not match schema: {0}")]
    Schema(String),

    #[error("Environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Enrichment failed: {0}")]
    Failed(String),
}

/// Result type for enrichment calls
pub type EnrichResult<T> = Result<T, EnrichError>;

/// Per-call context handed to an enricher
#[derive(Debug, Clone, Copy)]
pub struct EnrichContext<'a> {
    /// Worker issuing the call, for log correlation
    pub worker_id: usize,

    /// Identifier of the item being enriched
    pub item_id: &'a str,

    /// Shared limiter, for enrichers that fan out into extra requests
    ///
    /// The pipeline already holds one token for the call itself.
    pub limiter: &'a RateLimiter,

    /// Reference data shared by every call, if configured
    pub base_data: Option<&'a Value>,
}

/// Trait for enrichment backends
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Enriches a single input record
    ///
    /// An empty record is treated as "no result": the item is not marked processed and will
    /// be attempted again on the next run.
    async fn enrich(
        &self,
        ctx: &EnrichContext<'_>,
        payload: &Value,
    ) -> EnrichResult<EnrichedRecord>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
