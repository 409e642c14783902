//! Output module for enrichment results and progress reports
//!
//! This module handles:
//! - The JSON-array results file that flushed records are appended to
//! - Reading back checkpoint statistics for the `--stats` mode

mod json_array;
pub mod stats;

pub use json_array::{append_records, read_records, OutputError};
pub use stats::{load_statistics, print_statistics, CheckpointStatistics};
