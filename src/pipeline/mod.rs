//! Pipeline module - producer, worker pool and their coordination
//!
//! # Components
//!
//! - `Producer`: scans dataset directories and fills the bounded work queue
//! - `RateLimitedExecutor`: concurrency cap, token-bucket limiter and retry around each call
//! - Workers: drain the queue, record results and save checkpoints
//! - `Pipeline`: owns a run from checkpoint load to final flush

pub mod citations;
mod coordinator;
mod executor;
mod limiter;
mod producer;
mod progress;
mod retry;
mod worker;

pub use citations::{clean_record, remove_citations};
pub use coordinator::{run_enrichment, Pipeline, PipelineReport};
pub use executor::RateLimitedExecutor;
pub use limiter::RateLimiter;
pub use producer::{parse_items, scan_files, Producer, ProducerSummary, ScanFilter};
pub use progress::{Persister, SharedProgress};
pub use retry::RetryPolicy;
pub use worker::{run_worker, WorkerContext, WorkerSummary};
