//! Enrichment backends
//!
//! This module defines the seam between the pipeline and the external enrichment call:
//! - `Enricher`: the async trait every backend implements
//! - `EnrichedRecord`: the structured result, plus an optional declared `ResultSchema`
//! - `HttpEnricher`: a chat-completion API client
//! - JSON extraction from model output

mod extract;
mod http;
mod record;
mod traits;

pub use extract::extract_json_object;
pub use http::{build_http_client, HttpEnricher};
pub use record::{EnrichedRecord, ResultSchema};
pub use traits::{EnrichContext, EnrichError, EnrichResult, Enricher};
