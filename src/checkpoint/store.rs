//! JSON checkpoint file with atomic replace
//!
//! A save writes the full state to `processing_state.tmp` in the checkpoint directory, syncs
//! it, then renames it over `processing_state.json`. Readers only ever see a complete file.

use crate::state::ProcessingState;
use crate::CheckpointError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CHECKPOINT_FILE: &str = "processing_state.json";
const TEMP_FILE: &str = "processing_state.tmp";

/// On-disk checkpoint layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointFile {
    #[serde(default)]
    pub processed_files: Vec<String>,
    /// `"<dataset>:<file>"` keys of completed files
    #[serde(default)]
    pub completed_files: Vec<String>,
    #[serde(default)]
    pub processed_items: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub total_processed: u64,
    #[serde(default)]
    pub total_items: u64,
    /// ISO-8601 time of the save
    #[serde(default)]
    pub timestamp: String,
}

impl CheckpointFile {
    /// Snapshots a state, sorting sets so that identical states serialize identically
    pub fn from_state(state: &ProcessingState) -> Self {
        let mut processed_files: Vec<String> = state.processed_files.iter().cloned().collect();
        processed_files.sort();

        let mut completed_files: Vec<String> = state.completed_files.iter().cloned().collect();
        completed_files.sort();

        let processed_items = state
            .processed_items
            .iter()
            .map(|(key, items)| {
                let mut items: Vec<String> = items.iter().cloned().collect();
                items.sort();
                (key.clone(), items)
            })
            .collect();

        Self {
            processed_files,
            completed_files,
            processed_items,
            current_file: state.current_file.clone(),
            total_processed: state.total_processed,
            total_items: state.total_items,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Rebuilds an in-memory state; the elapsed-time clock starts now
    pub fn into_state(self) -> ProcessingState {
        let mut state = ProcessingState::new();
        state.processed_files = self.processed_files.into_iter().collect();
        state.completed_files = self.completed_files.into_iter().collect();
        state.processed_items = self
            .processed_items
            .into_iter()
            .map(|(key, items)| (key, items.into_iter().collect::<HashSet<_>>()))
            .collect();
        state.current_file = self.current_file;
        state.total_processed = self.total_processed;
        state.total_items = self.total_items;
        state
    }
}

/// Durable store for `ProcessingState`
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    directory: PathBuf,
}

impl CheckpointStore {
    /// Creates a store rooted at `directory`; nothing is touched on disk until the first save
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Path of the committed checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.directory.join(CHECKPOINT_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.directory.join(TEMP_FILE)
    }

    /// Writes the state and atomically replaces the previous checkpoint
    ///
    /// A failure at any step leaves the previously committed checkpoint untouched.
    pub fn save(&self, state: &ProcessingState) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.directory).map_err(|source| CheckpointError::CreateDir {
            path: self.directory.display().to_string(),
            source,
        })?;

        let snapshot = CheckpointFile::from_state(state);
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let temp_path = self.temp_path();
        write_synced(&temp_path, &json).map_err(|source| CheckpointError::Write {
            path: temp_path.display().to_string(),
            source,
        })?;

        let final_path = self.checkpoint_path();
        fs::rename(&temp_path, &final_path).map_err(|source| CheckpointError::Rename {
            path: final_path.display().to_string(),
            source,
        })?;

        tracing::info!(
            processed = state.total_processed,
            total = state.total_items,
            "Checkpoint saved: {}/{} items processed",
            state.total_processed,
            state.total_items
        );

        Ok(())
    }

    /// Saves on the blocking thread pool so sibling tasks keep running during file I/O
    pub async fn save_async(&self, state: &ProcessingState) -> Result<(), CheckpointError> {
        let store = self.clone();
        let state = state.clone();
        tokio::task::spawn_blocking(move || store.save(&state)).await?
    }

    /// Reads the raw checkpoint file
    ///
    /// Returns `Ok(None)` when no checkpoint exists.
    pub fn read(&self) -> io::Result<Option<CheckpointFile>> {
        let path = self.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read(&path)?;
        let file = serde_json::from_slice(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(file))
    }

    /// Loads the last committed state
    ///
    /// A missing checkpoint is a cold start. An unreadable or corrupt checkpoint is logged
    /// and also yields a fresh state: reprocessing is preferred over refusing to start.
    pub fn load(&self) -> ProcessingState {
        match self.read() {
            Ok(Some(file)) => {
                let state = file.into_state();
                tracing::info!(
                    "Checkpoint loaded: {}/{} items already processed",
                    state.total_processed,
                    state.total_items
                );
                state
            }
            Ok(None) => {
                tracing::info!("No checkpoint found, starting fresh");
                ProcessingState::new()
            }
            Err(e) => {
                tracing::error!(
                    path = %self.checkpoint_path().display(),
                    "Failed to load checkpoint, starting fresh: {}",
                    e
                );
                ProcessingState::new()
            }
        }
    }
}

/// Writes `bytes` to `path` and flushes them to disk before returning
pub(crate) fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
