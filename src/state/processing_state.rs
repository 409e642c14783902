/// Durable progress tracking for a pipeline run
///
/// This module defines the in-memory record of which files and items have been enriched.
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Builds the composite `"<dataset>:<file>"` key used in `processed_items`
pub fn item_key(dataset: &str, file: &str) -> String {
    format!("{}:{}", dataset, file)
}

/// Progress of a pipeline run
///
/// An item identifier is only added to `processed_items` after its enrichment result has been
/// cleaned and pushed onto the result buffer.
#[derive(Debug, Clone)]
pub struct ProcessingState {
    /// Names of files whose items all have recorded results
    pub processed_files: HashSet<String>,

    /// Completed files keyed by `"<dataset>:<file>"`
    ///
    /// Datasets may share file names, so scanning skips files by this set rather than by
    /// `processed_files`.
    pub completed_files: HashSet<String>,

    /// Completed item identifiers keyed by `"<dataset>:<file>"`
    pub processed_items: HashMap<String, HashSet<String>>,

    /// File the producer was scanning when the state was last saved
    pub current_file: Option<String>,

    /// Number of items enriched successfully
    pub total_processed: u64,

    /// Number of items known to the run (processed plus enqueued)
    pub total_items: u64,

    /// When this state was created or loaded, for elapsed-time reporting
    pub started_at: Instant,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingState {
    /// Creates an empty state for a cold start
    pub fn new() -> Self {
        Self {
            processed_files: HashSet::new(),
            completed_files: HashSet::new(),
            processed_items: HashMap::new(),
            current_file: None,
            total_processed: 0,
            total_items: 0,
            started_at: Instant::now(),
        }
    }

    /// Returns true if a file of this name has been completed in any dataset
    pub fn is_file_processed(&self, file: &str) -> bool {
        self.processed_files.contains(file)
    }

    /// Returns true if every item of the dataset's file has been enriched
    pub fn is_file_complete(&self, dataset: &str, file: &str) -> bool {
        self.completed_files.contains(&item_key(dataset, file))
    }

    /// Names of the files completed in `dataset`
    pub fn completed_files_in<'a>(
        &'a self,
        dataset: &str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = format!("{}:", dataset);
        self.completed_files
            .iter()
            .filter_map(move |key| key.strip_prefix(prefix.as_str()))
    }

    /// Returns true if the item has already been enriched
    pub fn is_item_processed(&self, dataset: &str, file: &str, item_id: &str) -> bool {
        self.processed_items
            .get(&item_key(dataset, file))
            .is_some_and(|items| items.contains(item_id))
    }

    /// Records that the producer is now scanning `file`
    pub fn begin_file(&mut self, dataset: &str, file: &str) {
        self.current_file = Some(file.to_string());
        self.processed_items
            .entry(item_key(dataset, file))
            .or_default();
    }

    /// Marks a dataset's file as complete
    pub fn mark_file_processed(&mut self, dataset: &str, file: &str) {
        self.completed_files.insert(item_key(dataset, file));
        self.processed_files.insert(file.to_string());
    }

    /// Marks an item as enriched
    ///
    /// Returns false if the item was already recorded, in which case the counters are
    /// left untouched.
    pub fn mark_item_processed(&mut self, dataset: &str, file: &str, item_id: &str) -> bool {
        let inserted = self
            .processed_items
            .entry(item_key(dataset, file))
            .or_default()
            .insert(item_id.to_string());

        if inserted {
            self.total_processed += 1;
        }
        inserted
    }

    /// Adds newly discovered items to the progress total
    pub fn add_pending(&mut self, count: u64) {
        self.total_items += count;
    }

    /// Starts a new run on top of the loaded progress
    ///
    /// `total_items` is recomputed from what this run enqueues, so it restarts at the
    /// number of items already processed.
    pub fn reset_run_counters(&mut self) {
        self.total_items = self.total_processed;
        self.started_at = Instant::now();
    }

    /// Number of items recorded under a dataset:file key
    pub fn processed_count(&self, dataset: &str, file: &str) -> usize {
        self.processed_items
            .get(&item_key(dataset, file))
            .map_or(0, HashSet::len)
    }

    /// Time since this state was created or the run counters were reset
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
