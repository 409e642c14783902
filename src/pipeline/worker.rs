//! Worker loop
//!
//! Each worker pulls messages from the shared queue until it receives `Shutdown`:
//! - `Work`: enrich through the executor, clean the result, record it, and save a checkpoint
//!   every `checkpoint_interval` processed items
//! - `Shutdown`: flush results and the checkpoint one last time, then exit
//!
//! A failing item is logged and dropped for the rest of the run; it stays unmarked, so the
//! next run picks it up again.

use crate::enrich::{EnrichContext, EnrichError, Enricher};
use crate::pipeline::citations::clean_record;
use crate::pipeline::{Persister, RateLimitedExecutor, SharedProgress};
use crate::state::{QueueMessage, WorkItem};
use crate::PipelineError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Everything a worker shares with its siblings
pub struct WorkerContext {
    pub enricher: Arc<dyn Enricher>,
    pub executor: RateLimitedExecutor,
    pub progress: Arc<Mutex<SharedProgress>>,
    pub persister: Persister,
    pub receiver: Arc<Mutex<mpsc::Receiver<QueueMessage>>>,
    pub base_data: Option<Arc<Value>>,
    pub checkpoint_interval: u64,
    pub call_timeout: Duration,
}

/// What happened to one successfully handled message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Recorded,
    /// The enricher returned no fields
    Empty,
    /// Another worker already recorded this item
    Duplicate,
}

/// Counters reported by a finished worker
#[derive(Debug, Clone, Default)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub succeeded: usize,
    pub empty: usize,
    /// `"<dataset>:<file>:<item>"` of every item that failed
    pub failed: Vec<String>,
}

/// Runs one worker until it receives `Shutdown` or the queue closes
///
/// Per-item failures never end the loop. The final flush always runs; its error is the only
/// one returned.
pub async fn run_worker(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
) -> Result<WorkerSummary, PipelineError> {
    let mut summary = WorkerSummary {
        worker_id,
        ..Default::default()
    };

    tracing::debug!(worker = worker_id, "Worker started");

    loop {
        let message = {
            let mut receiver = ctx.receiver.lock().await;
            receiver.recv().await
        };

        let item = match message {
            Some(QueueMessage::Work(item)) => item,
            Some(QueueMessage::Shutdown) => break,
            None => {
                tracing::warn!(worker = worker_id, "Queue closed without a shutdown signal");
                break;
            }
        };

        match handle_item(worker_id, &ctx, &item).await {
            Ok(ItemOutcome::Recorded) => summary.succeeded += 1,
            Ok(ItemOutcome::Empty) => summary.empty += 1,
            Ok(ItemOutcome::Duplicate) => {}
            Err(e) => {
                tracing::error!(
                    worker = worker_id,
                    dataset = %item.dataset,
                    file = %item.file,
                    item = %item.item_id,
                    "Failed to enrich item {}: {}",
                    item.item_id,
                    e
                );
                summary
                    .failed
                    .push(format!("{}:{}", item.key(), item.item_id));
            }
        }
    }

    tracing::debug!(worker = worker_id, "Worker shutting down, flushing progress");
    let mut progress = ctx.progress.lock().await;
    ctx.persister.persist(&mut progress).await?;

    Ok(summary)
}

async fn handle_item(
    worker_id: usize,
    ctx: &WorkerContext,
    item: &WorkItem,
) -> Result<ItemOutcome, PipelineError> {
    let label = format!("{}:{}", item.key(), item.item_id);
    let enricher = &ctx.enricher;
    let payload = &item.payload;
    let call_timeout = ctx.call_timeout;
    let enrich_ctx = EnrichContext {
        worker_id,
        item_id: &item.item_id,
        limiter: ctx.executor.limiter(),
        base_data: ctx.base_data.as_deref(),
    };

    let mut record = ctx
        .executor
        .execute(&label, move |_| async move {
            let call = enricher.enrich(&enrich_ctx, payload);
            match tokio::time::timeout(call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(EnrichError::Timeout {
                    secs: call_timeout.as_secs(),
                }),
            }
        })
        .await?;

    if record.is_empty() {
        tracing::warn!(
            worker = worker_id,
            dataset = %item.dataset,
            file = %item.file,
            item = %item.item_id,
            "Enrichment returned no fields, leaving item unprocessed"
        );
        return Ok(ItemOutcome::Empty);
    }

    clean_record(&mut record);

    let mut progress = ctx.progress.lock().await;
    if !progress.record_success(item, record) {
        tracing::debug!(item = %label, "Item already recorded, discarding result");
        return Ok(ItemOutcome::Duplicate);
    }

    let processed = progress.state.total_processed;
    tracing::info!(
        worker = worker_id,
        dataset = %item.dataset,
        file = %item.file,
        item = %item.item_id,
        "Processed {}/{} items",
        processed,
        progress.state.total_items
    );

    if ctx.checkpoint_interval > 0 && processed % ctx.checkpoint_interval == 0 {
        if let Err(e) = ctx.persister.persist(&mut progress).await {
            tracing::error!(worker = worker_id, "Periodic checkpoint failed: {}", e);
        }
    }

    Ok(ItemOutcome::Recorded)
}
