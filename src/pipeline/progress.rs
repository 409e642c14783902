//! Shared progress and its persistence
//!
//! All workers mutate one `SharedProgress` behind a single `tokio::sync::Mutex`. Recording a
//! result and saving a checkpoint both happen while that lock is held, so a save always sees a
//! consistent snapshot and two saves never overlap.

use crate::checkpoint::CheckpointStore;
use crate::enrich::EnrichedRecord;
use crate::output::append_records;
use crate::state::{item_key, ProcessingState, WorkItem};
use crate::PipelineError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Progress state plus the result buffer it vouches for
#[derive(Debug)]
pub struct SharedProgress {
    pub state: ProcessingState,

    /// Every result recorded this run, in completion order
    pub results: Vec<EnrichedRecord>,

    /// Number of leading `results` already appended to the results file
    flushed: usize,

    /// Items enqueued but not yet recorded, per `"<dataset>:<file>"` key
    outstanding: HashMap<String, usize>,
}

impl SharedProgress {
    pub fn new(state: ProcessingState) -> Self {
        Self {
            state,
            results: Vec::new(),
            flushed: 0,
            outstanding: HashMap::new(),
        }
    }

    /// Registers the items of a file about to be enqueued
    ///
    /// A file with nothing pending is complete right away. Otherwise it is marked processed
    /// when its last outstanding item is recorded, so a file with failed items is scanned
    /// again on the next run.
    pub fn expect_items(&mut self, dataset: &str, file: &str, count: usize) {
        self.state.add_pending(count as u64);
        if count == 0 {
            self.state.mark_file_processed(dataset, file);
        } else {
            self.outstanding.insert(item_key(dataset, file), count);
        }
    }

    /// Items of a file still waiting for a result
    pub fn outstanding(&self, dataset: &str, file: &str) -> usize {
        self.outstanding
            .get(&item_key(dataset, file))
            .copied()
            .unwrap_or(0)
    }

    /// Stores a cleaned result and marks its item processed
    ///
    /// The record is buffered before the item is marked. Returns false, without buffering,
    /// if the item was already recorded.
    pub fn record_success(&mut self, item: &WorkItem, record: EnrichedRecord) -> bool {
        if self
            .state
            .is_item_processed(&item.dataset, &item.file, &item.item_id)
        {
            return false;
        }

        self.results.push(record);
        self.state
            .mark_item_processed(&item.dataset, &item.file, &item.item_id);

        let key = item.key();
        if let Some(remaining) = self.outstanding.get_mut(&key) {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.outstanding.remove(&key);
                self.state.mark_file_processed(&item.dataset, &item.file);
            }
        }
        true
    }

    /// Results not yet written to the results file
    pub fn unflushed(&self) -> &[EnrichedRecord] {
        &self.results[self.flushed..]
    }
}

/// Writes buffered results and the checkpoint to disk
#[derive(Debug, Clone)]
pub struct Persister {
    store: CheckpointStore,
    results_path: PathBuf,
}

impl Persister {
    pub fn new(store: CheckpointStore, results_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            results_path: results_path.into(),
        }
    }

    /// Appends unflushed results to the results file, then saves the checkpoint
    ///
    /// Results go first: a crash between the two writes can duplicate records in the results
    /// file on resume, but never loses a record whose item the checkpoint calls processed.
    pub async fn persist(&self, progress: &mut SharedProgress) -> Result<(), PipelineError> {
        let pending = progress.unflushed().to_vec();
        if !pending.is_empty() {
            let path = self.results_path.clone();
            let count = pending.len();
            tokio::task::spawn_blocking(move || append_records(&path, &pending)).await??;
            progress.flushed += count;
        }

        self.store.save_async(&progress.state).await?;
        Ok(())
    }
}
