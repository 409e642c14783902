//! Results file: a single JSON array of enriched records
//!
//! Each flush reads the existing file, appends the new records and rewrites the whole file
//! through a temporary sibling and a rename.

use crate::checkpoint::write_synced;
use crate::enrich::EnrichedRecord;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Results file errors
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to read results file {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("Failed to write results file {path}: {source}")]
    Write { path: String, source: io::Error },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads the records currently stored at `path`
///
/// A missing, empty or invalid file reads as no records. A file holding a single object reads
/// as a one-element list.
pub fn read_records(path: &Path) -> Result<Vec<Value>, OutputError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(OutputError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice::<Value>(&content) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => Ok(vec![other]),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                "Results file is not valid JSON, starting a new array: {}",
                e
            );
            Ok(Vec::new())
        }
    }
}

/// Appends `records` to the JSON array at `path`
///
/// Returns the number of records in the file afterwards. Parent directories are created as
/// needed. Appending nothing leaves the file untouched.
pub fn append_records(path: &Path, records: &[EnrichedRecord]) -> Result<usize, OutputError> {
    let mut existing = read_records(path)?;
    if records.is_empty() {
        return Ok(existing.len());
    }

    existing.extend(records.iter().cloned().map(EnrichedRecord::into_value));
    let json = serde_json::to_vec_pretty(&existing)?;

    let write_err = |source| OutputError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp_path = temp_path_for(path);
    write_synced(&temp_path, &json).map_err(write_err)?;
    fs::rename(&temp_path, path).map_err(write_err)?;

    tracing::debug!(
        path = %path.display(),
        appended = records.len(),
        total = existing.len(),
        "Results appended"
    );

    Ok(existing.len())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "results".into());
    name.push(".tmp");
    path.with_file_name(name)
}
