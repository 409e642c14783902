//! State module for tracking enrichment progress
//!
//! # Components
//!
//! - `ProcessingState`: which files and items are done, plus progress counters
//! - `WorkItem`: one record travelling from the producer to a worker
//! - `QueueMessage`: the queue element, either work or a shutdown signal

mod processing_state;
mod work_item;

// Re-export main types
pub use processing_state::{item_key, ProcessingState};
pub use work_item::{QueueMessage, WorkItem};
