//! Pipeline coordinator - main enrichment orchestration logic
//!
//! This module wires the producer, the worker pool and the checkpoint store together:
//! - Loading or discarding the previous checkpoint
//! - Spawning the producer and `workers` worker tasks around one bounded queue
//! - Sending one shutdown signal per worker once the producer is done
//! - Collecting per-worker summaries into a `PipelineReport`

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::enrich::{EnrichedRecord, Enricher};
use crate::pipeline::worker::{run_worker, WorkerContext};
use crate::pipeline::{Persister, Producer, RateLimitedExecutor, SharedProgress};
use crate::state::{ProcessingState, QueueMessage};
use crate::PipelineError;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Outcome of a finished run
#[derive(Debug)]
pub struct PipelineReport {
    /// Progress after the final flush
    pub state: ProcessingState,

    /// Results recorded during this run, in completion order
    pub results: Vec<EnrichedRecord>,

    /// `"<dataset>:<file>:<item>"` of items that exhausted their retries
    pub failed_items: Vec<String>,

    /// Items whose enrichment came back without fields
    pub empty_results: usize,

    /// Files skipped as unreadable or of the wrong shape
    pub files_skipped: usize,

    pub elapsed: Duration,
}

/// Main pipeline structure
pub struct Pipeline {
    config: Arc<Config>,
    enricher: Arc<dyn Enricher>,
    store: CheckpointStore,
    state: ProcessingState,
    base_data: Option<Arc<Value>>,
}

impl Pipeline {
    /// Creates a new pipeline
    ///
    /// # Arguments
    ///
    /// * `config` - The pipeline configuration
    /// * `enricher` - Backend invoked once per work item
    /// * `fresh` - Ignore any existing checkpoint for this run
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to run
    /// * `Err(PipelineError)` - The base data file could not be loaded
    pub fn new(
        config: Config,
        enricher: Arc<dyn Enricher>,
        fresh: bool,
    ) -> Result<Self, PipelineError> {
        let store = CheckpointStore::new(&config.checkpoint.directory);

        let state = if config.pipeline.resume && !fresh {
            store.load()
        } else {
            tracing::info!("Resume disabled, starting from an empty state");
            ProcessingState::new()
        };

        let base_data = match &config.enrichment.base_data_path {
            Some(path) => Some(Arc::new(load_base_data(path)?)),
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            enricher,
            store,
            state,
            base_data,
        })
    }

    /// Replaces the starting state
    pub fn with_state(mut self, state: ProcessingState) -> Self {
        self.state = state;
        self
    }

    /// State the next run starts from
    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    /// Runs the producer and worker pool to completion
    ///
    /// Item failures are reported in the returned `PipelineReport`. An error is returned only
    /// when the producer lost its queue or a worker's final flush failed, and only after every
    /// worker has finished.
    pub async fn run(self) -> Result<PipelineReport, PipelineError> {
        let workers = self.config.pipeline.workers.max(1);
        tracing::info!(
            "Starting enrichment with {} workers using {} backend",
            workers,
            self.enricher.name()
        );

        let mut state = self.state;
        state.reset_run_counters();
        let started_at = state.started_at;

        let progress = Arc::new(Mutex::new(SharedProgress::new(state)));
        let persister = Persister::new(self.store.clone(), &self.config.output.results_path);
        let (sender, receiver) = mpsc::channel(self.config.pipeline.queue_capacity.max(1));

        let worker_ctx = Arc::new(WorkerContext {
            enricher: self.enricher.clone(),
            executor: RateLimitedExecutor::from_config(&self.config),
            progress: progress.clone(),
            persister: persister.clone(),
            receiver: Arc::new(Mutex::new(receiver)),
            base_data: self.base_data.clone(),
            checkpoint_interval: self.config.pipeline.checkpoint_interval,
            call_timeout: self.config.enrichment.timeout(),
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, worker_ctx.clone())))
            .collect();
        // Only the workers keep the receiver alive from here on
        drop(worker_ctx);

        let producer = Producer::new(
            self.config.datasets.clone(),
            progress.clone(),
            sender.clone(),
        );
        let producer_result = tokio::spawn(producer.run()).await;

        // Producer is done: sentinels queue up behind the remaining work
        for _ in 0..workers {
            if sender.send(QueueMessage::Shutdown).await.is_err() {
                tracing::warn!("All workers exited before shutdown was signalled");
                break;
            }
        }
        drop(sender);

        let mut first_error = None;
        let mut files_skipped = 0;
        match producer_result {
            Ok(Ok(summary)) => files_skipped = summary.files_skipped,
            Ok(Err(e)) => {
                tracing::error!("Producer failed: {}", e);
                first_error = Some(e);
            }
            Err(e) => {
                tracing::error!("Producer task panicked: {}", e);
                first_error = Some(PipelineError::Join(e));
            }
        }

        let mut failed_items = Vec::new();
        let mut empty_results = 0;
        let mut unflushed_exit = false;

        for handle in handles {
            match handle.await {
                Ok(Ok(summary)) => {
                    tracing::debug!(
                        worker = summary.worker_id,
                        "Worker finished: {} succeeded, {} failed",
                        summary.succeeded,
                        summary.failed.len()
                    );
                    empty_results += summary.empty;
                    failed_items.extend(summary.failed);
                }
                Ok(Err(e)) => {
                    tracing::error!("Worker final flush failed: {}", e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!("Worker task panicked: {}", e);
                    unflushed_exit = true;
                    first_error.get_or_insert(PipelineError::Join(e));
                }
            }
        }

        let mut progress = progress.lock().await;

        // A panicked worker skipped its final flush
        if unflushed_exit {
            if let Err(e) = persister.persist(&mut progress).await {
                tracing::error!("Final checkpoint failed: {}", e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let report = PipelineReport {
            state: progress.state.clone(),
            results: std::mem::take(&mut progress.results),
            failed_items,
            empty_results,
            files_skipped,
            elapsed: started_at.elapsed(),
        };

        tracing::info!(
            "Enrichment finished in {:.1}s: {}/{} items processed, {} failed this run",
            report.elapsed.as_secs_f64(),
            report.state.total_processed,
            report.state.total_items,
            report.failed_items.len()
        );

        Ok(report)
    }
}

/// Loads the reference document handed to every enrichment call
fn load_base_data(path: &Path) -> Result<Value, PipelineError> {
    let content = std::fs::read(path).map_err(|source| PipelineError::InputRead {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_slice(&content).map_err(|source| PipelineError::InputParse {
        path: path.display().to_string(),
        source,
    })
}

/// Main entry point for running an enrichment batch
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `enricher` - Backend invoked once per work item
/// * `fresh` - Ignore any existing checkpoint
pub async fn run_enrichment(
    config: Config,
    enricher: Arc<dyn Enricher>,
    fresh: bool,
) -> Result<PipelineReport, PipelineError> {
    let pipeline = Pipeline::new(config, enricher, fresh)?;
    pipeline.run().await
}
