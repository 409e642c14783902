use crate::state::processing_state::item_key;
use serde_json::Value;

/// A single record handed from the producer to a worker
///
/// Ownership moves with the queue message; the producer keeps no reference after sending.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Label of the dataset the file belongs to
    pub dataset: String,

    /// Input file name within the dataset directory
    pub file: String,

    /// Item identifier: the object key, or the array index for array files
    pub item_id: String,

    /// Raw record content from the input file
    pub payload: Value,
}

impl WorkItem {
    pub fn new(dataset: &str, file: &str, item_id: impl Into<String>, payload: Value) -> Self {
        Self {
            dataset: dataset.to_string(),
            file: file.to_string(),
            item_id: item_id.into(),
            payload,
        }
    }

    /// The `"<dataset>:<file>"` checkpoint key this item is recorded under
    pub fn key(&self) -> String {
        item_key(&self.dataset, &self.file)
    }
}

/// Element of the work queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueMessage {
    /// An item to enrich
    Work(WorkItem),

    /// Tells the receiving worker to flush and exit
    Shutdown,
}
