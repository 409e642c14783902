//! Checkpoint module for persisting pipeline progress
//!
//! Progress is kept in a single JSON file that is replaced atomically on every save, so an
//! interrupted run can always resume from the last complete checkpoint.

mod store;

pub(crate) use store::write_synced;
pub use store::{CheckpointFile, CheckpointStore};
