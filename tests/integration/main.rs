//! Integration tests for Batch-Enrich

mod enricher_tests;
mod pipeline_tests;
