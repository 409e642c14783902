//! Input file scanning and work production
//!
//! The producer walks each dataset directory, parses every pending `.json` file and pushes one
//! `WorkItem` per unprocessed record onto the bounded queue. A full queue suspends the
//! producer until a worker takes an item.
//!
//! A file joins `processed_files` once every one of its items has a recorded result: right
//! after scanning if nothing was pending, otherwise when a worker records its last item.

use crate::config::DatasetEntry;
use crate::pipeline::SharedProgress;
use crate::state::{ProcessingState, QueueMessage, WorkItem};
use crate::PipelineError;
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

const INPUT_EXTENSION: &str = "json";

/// Completion snapshot used to filter one dataset's directory listing
///
/// Taken under the progress lock so that listing the directory does not hold it.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    completed: HashSet<String>,
    current_file: Option<String>,
}

impl ScanFilter {
    pub fn for_dataset(state: &ProcessingState, dataset: &str) -> Self {
        Self {
            completed: state
                .completed_files_in(dataset)
                .map(str::to_string)
                .collect(),
            current_file: state.current_file.clone(),
        }
    }
}

/// Lists the input files of `directory` that still need scanning
///
/// Files are sorted by name, files the dataset already completed are dropped, and the file
/// recorded as `current_file` (if still pending) is moved to the front so an interrupted
/// file is finished before new ones are started.
pub async fn scan_files(directory: &Path, filter: &ScanFilter) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(directory).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if !entry.file_type().await?.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(INPUT_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!("Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };

        if !filter.completed.contains(name) {
            files.push(name.to_string());
        }
    }

    files.sort();

    if let Some(current) = &filter.current_file {
        if let Some(pos) = files.iter().position(|f| f == current) {
            let file = files.remove(pos);
            files.insert(0, file);
        }
    }

    Ok(files)
}

/// Splits parsed file content into `(item_id, payload)` pairs
///
/// Objects yield their keys as identifiers, arrays their positional indexes. Any other shape
/// returns `None`.
pub fn parse_items(content: Value) -> Option<Vec<(String, Value)>> {
    match content {
        Value::Object(map) => Some(map.into_iter().collect()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .enumerate()
                .map(|(idx, payload)| (idx.to_string(), payload))
                .collect(),
        ),
        _ => None,
    }
}

/// Counters reported by a finished producer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Files whose pending items were all enqueued
    pub files_completed: usize,

    /// Files skipped because they could not be read or had the wrong shape
    pub files_skipped: usize,

    /// Work items pushed onto the queue
    pub items_enqueued: usize,
}

/// Feeds work items from the configured datasets into the queue
pub struct Producer {
    datasets: Vec<DatasetEntry>,
    progress: Arc<Mutex<SharedProgress>>,
    sender: mpsc::Sender<QueueMessage>,
}

impl Producer {
    pub fn new(
        datasets: Vec<DatasetEntry>,
        progress: Arc<Mutex<SharedProgress>>,
        sender: mpsc::Sender<QueueMessage>,
    ) -> Self {
        Self {
            datasets,
            progress,
            sender,
        }
    }

    /// Scans every dataset in order
    ///
    /// Returns once all pending items have been enqueued. Read and parse failures are confined
    /// to their file; only a closed queue stops the producer early.
    pub async fn run(self) -> Result<ProducerSummary, PipelineError> {
        let mut summary = ProducerSummary::default();

        for dataset in &self.datasets {
            let filter = {
                let progress = self.progress.lock().await;
                ScanFilter::for_dataset(&progress.state, &dataset.label)
            };

            let files = match scan_files(&dataset.directory, &filter).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::error!(
                        dataset = %dataset.label,
                        "Failed to list {}: {}",
                        dataset.directory.display(),
                        e
                    );
                    continue;
                }
            };

            tracing::info!(
                dataset = %dataset.label,
                "Found {} pending files in {}",
                files.len(),
                dataset.directory.display()
            );

            for file in files {
                if self.produce_file(dataset, &file, &mut summary).await? {
                    summary.files_completed += 1;
                } else {
                    summary.files_skipped += 1;
                }
            }
        }

        tracing::info!(
            "Producer finished: {} files completed, {} skipped, {} items enqueued",
            summary.files_completed,
            summary.files_skipped,
            summary.items_enqueued
        );

        Ok(summary)
    }

    /// Enqueues the pending items of one file
    ///
    /// Returns false if the file was skipped.
    async fn produce_file(
        &self,
        dataset: &DatasetEntry,
        file: &str,
        summary: &mut ProducerSummary,
    ) -> Result<bool, PipelineError> {
        self.progress
            .lock()
            .await
            .state
            .begin_file(&dataset.label, file);

        let path = dataset.directory.join(file);
        let items = match read_items(&path).await {
            Ok(Some(items)) => items,
            Ok(None) => {
                tracing::warn!(
                    dataset = %dataset.label,
                    file = file,
                    "Skipping {}: expected a JSON object or array",
                    path.display()
                );
                return Ok(false);
            }
            Err(e) => {
                tracing::error!(dataset = %dataset.label, file = file, "Skipping file: {}", e);
                return Ok(false);
            }
        };

        let pending: Vec<WorkItem> = {
            let mut progress = self.progress.lock().await;
            let pending: Vec<WorkItem> = items
                .into_iter()
                .filter(|(id, _)| !progress.state.is_item_processed(&dataset.label, file, id))
                .map(|(id, payload)| WorkItem::new(&dataset.label, file, id, payload))
                .collect();
            progress.expect_items(&dataset.label, file, pending.len());
            pending
        };

        tracing::info!(
            dataset = %dataset.label,
            file = file,
            "Enqueueing {} pending items",
            pending.len()
        );

        for item in pending {
            self.sender
                .send(QueueMessage::Work(item))
                .await
                .map_err(|_| PipelineError::QueueClosed)?;
            summary.items_enqueued += 1;
        }

        Ok(true)
    }
}

async fn read_items(path: &Path) -> Result<Option<Vec<(String, Value)>>, PipelineError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| PipelineError::InputRead {
            path: path.display().to_string(),
            source,
        })?;

    let value: Value =
        serde_json::from_slice(&content).map_err(|source| PipelineError::InputParse {
            path: path.display().to_string(),
            source,
        })?;

    Ok(parse_items(value))
}
