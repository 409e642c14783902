//! Statistics from the checkpoint and results file
//!
//! This module backs the `--stats` mode: it reads the committed checkpoint without running
//! anything and summarizes how far the batch has progressed.

use crate::checkpoint::CheckpointStore;
use crate::output::read_records;
use crate::PipelineError;
use std::path::Path;

/// Progress summary read back from disk
#[derive(Debug, Clone)]
pub struct CheckpointStatistics {
    /// Files whose items all have recorded results
    pub processed_files: Vec<String>,

    /// Completed item count per `"<dataset>:<file>"` key, sorted by key
    pub items_by_key: Vec<(String, usize)>,

    /// Items enriched successfully
    pub total_processed: u64,

    /// Items known to the last run
    pub total_items: u64,

    /// File the producer was scanning at the last save
    pub current_file: Option<String>,

    /// When the checkpoint was written
    pub timestamp: String,

    /// Records currently stored in the results file
    pub results_stored: usize,
}

/// Loads statistics from the checkpoint store and results file
///
/// # Returns
///
/// * `Ok(Some(stats))` - A checkpoint exists
/// * `Ok(None)` - No checkpoint has been written yet
/// * `Err(PipelineError)` - The checkpoint or results file could not be read
pub fn load_statistics(
    store: &CheckpointStore,
    results_path: &Path,
) -> Result<Option<CheckpointStatistics>, PipelineError> {
    let Some(file) = store.read()? else {
        return Ok(None);
    };

    let items_by_key = file
        .processed_items
        .iter()
        .map(|(key, items)| (key.clone(), items.len()))
        .collect();

    let results_stored = read_records(results_path)?.len();

    Ok(Some(CheckpointStatistics {
        processed_files: file.processed_files,
        items_by_key,
        total_processed: file.total_processed,
        total_items: file.total_items,
        current_file: file.current_file,
        timestamp: file.timestamp,
        results_stored,
    }))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CheckpointStatistics) {
    println!("=== Enrichment Statistics ===\n");

    println!("Overview:");
    println!("  Checkpoint written: {}", stats.timestamp);
    println!("  Items processed: {}", stats.total_processed);
    println!("  Items known to last run: {}", stats.total_items);
    println!("  Records in results file: {}", stats.results_stored);
    if let Some(current) = &stats.current_file {
        println!("  Last file scanned: {}", current);
    }
    println!();

    println!("Processed Files ({}):", stats.processed_files.len());
    for file in &stats.processed_files {
        println!("  - {}", file);
    }
    println!();

    if !stats.items_by_key.is_empty() {
        println!("Items by File:");
        for (key, count) in &stats.items_by_key {
            println!("  {}: {}", key, count);
        }
        println!();
    }

    let completion = if stats.total_items > 0 {
        (stats.total_processed as f64 / stats.total_items as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Completion: {:.1}% ({} / {} items)",
        completion, stats.total_processed, stats.total_items
    );
}
