//! End-to-end pipeline tests
//!
//! These tests drive the full producer/worker pipeline over temporary input directories with
//! a scripted in-memory enricher.

use async_trait::async_trait;
use batch_enrich::checkpoint::CheckpointStore;
use batch_enrich::config::{
    CheckpointConfig, Config, DatasetEntry, EnrichmentConfig, OutputConfig, PipelineConfig,
    RateLimitConfig, RetryConfig,
};
use batch_enrich::enrich::{EnrichContext, EnrichError, EnrichResult, EnrichedRecord, Enricher};
use batch_enrich::output::read_records;
use batch_enrich::pipeline::run_enrichment;
use batch_enrich::ProcessingState;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Enricher that fails a fixed set of item ids and logs every call
#[derive(Default)]
struct ScriptedEnricher {
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEnricher {
    fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for id in self.calls() {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl Enricher for ScriptedEnricher {
    async fn enrich(
        &self,
        ctx: &EnrichContext<'_>,
        payload: &Value,
    ) -> EnrichResult<EnrichedRecord> {
        self.calls.lock().unwrap().push(ctx.item_id.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(ctx.item_id) {
            return Err(EnrichError::Failed(format!("item {} is broken", ctx.item_id)));
        }

        let mut record = EnrichedRecord::new();
        record.insert("item", json!(ctx.item_id));
        record.insert("name", payload["name"].clone());
        record.insert("summary", json!("Builds things [1] [2, 3]"));
        Ok(record)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn create_test_config(dir: &TempDir, workers: usize) -> Config {
    Config {
        pipeline: PipelineConfig {
            queue_capacity: 4,
            workers,
            checkpoint_interval: 1,
            resume: true,
        },
        checkpoint: CheckpointConfig {
            directory: dir.path().join("checkpoints"),
        },
        rate_limit: RateLimitConfig {
            max_requests: 1000,
            period_secs: 1.0,
            max_concurrent: None,
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_jitter_ms: 0,
        },
        enrichment: EnrichmentConfig {
            endpoint: "http://localhost/unused".to_string(),
            model: "test".to_string(),
            api_key_env: "UNUSED".to_string(),
            timeout_secs: 5,
            temperature: 0.0,
            instructions: None,
            base_data_path: None,
            fields: vec![],
        },
        output: OutputConfig {
            results_path: dir.path().join("results.json"),
        },
        datasets: vec![DatasetEntry {
            label: "ds".to_string(),
            directory: dir.path().join("input"),
        }],
    }
}

fn write_input(dir: &TempDir, name: &str, content: &str) {
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join(name), content).unwrap();
}

fn load_checkpoint(config: &Config) -> ProcessingState {
    CheckpointStore::new(&config.checkpoint.directory).load()
}

fn result_items(path: &Path) -> Vec<String> {
    let mut items: Vec<String> = read_records(path)
        .unwrap()
        .into_iter()
        .map(|r| r["item"].as_str().unwrap().to_string())
        .collect();
    items.sort();
    items
}

const TWO_COMPANIES: &str = r#"{"1": {"name": "Acme"}, "2": {"name": "Globex"}}"#;

#[tokio::test]
async fn test_end_to_end_two_workers() {
    let dir = TempDir::new().unwrap();
    write_input(&dir, "a.json", TWO_COMPANIES);
    let config = create_test_config(&dir, 2);
    let enricher = Arc::new(ScriptedEnricher::default());

    let report = run_enrichment(config.clone(), enricher.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(report.state.total_processed, 2);
    assert_eq!(report.results.len(), 2);
    assert!(report.failed_items.is_empty());

    let saved = load_checkpoint(&config);
    assert_eq!(
        saved.processed_files,
        HashSet::from(["a.json".to_string()])
    );
    assert_eq!(
        saved.processed_items["ds:a.json"],
        HashSet::from(["1".to_string(), "2".to_string()])
    );
    assert_eq!(saved.total_processed, 2);

    assert_eq!(result_items(&config.output.results_path), vec!["1", "2"]);

    // Citation markers are stripped before results are stored
    let records = read_records(&config.output.results_path).unwrap();
    assert!(records.iter().all(|r| r["summary"] == "Builds things"));
}

#[tokio::test]
async fn test_crash_resume_retries_only_failed_item() {
    let dir = TempDir::new().unwrap();
    write_input(&dir, "a.json", TWO_COMPANIES);
    let config = create_test_config(&dir, 2);

    // First run: item "2" exhausts its retries
    let first = Arc::new(ScriptedEnricher::failing(&["2"]));
    let report = run_enrichment(config.clone(), first.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(report.failed_items, vec!["ds:a.json:2".to_string()]);
    assert_eq!(first.call_counts()["2"], 3);
    assert_eq!(first.call_counts()["1"], 1);

    let saved = load_checkpoint(&config);
    assert!(saved.is_item_processed("ds", "a.json", "1"));
    assert!(!saved.is_item_processed("ds", "a.json", "2"));
    assert!(!saved.is_file_processed("a.json"));
    assert_eq!(saved.total_processed, 1);

    // Second run against the same checkpoint
    let second = Arc::new(ScriptedEnricher::default());
    let report = run_enrichment(config.clone(), second.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(second.calls(), vec!["2"]);
    assert_eq!(report.results.len(), 1);

    let saved = load_checkpoint(&config);
    assert!(saved.is_file_processed("a.json"));
    assert_eq!(saved.total_processed, 2);
    assert_eq!(result_items(&config.output.results_path), vec!["1", "2"]);
}

#[tokio::test]
async fn test_resume_never_redispatches_processed_items() {
    let dir = TempDir::new().unwrap();
    write_input(
        &dir,
        "b.json",
        r#"{"x": {"name": "X"}, "y": {"name": "Y"}, "z": {"name": "Z"}}"#,
    );
    let config = create_test_config(&dir, 3);

    let mut state = ProcessingState::new();
    state.current_file = Some("b.json".to_string());
    state.mark_item_processed("ds", "b.json", "x");
    state.mark_item_processed("ds", "b.json", "z");
    CheckpointStore::new(&config.checkpoint.directory)
        .save(&state)
        .unwrap();

    let enricher = Arc::new(ScriptedEnricher::default());
    let report = run_enrichment(config.clone(), enricher.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(enricher.calls(), vec!["y"]);
    assert_eq!(report.state.total_processed, 3);
    assert_eq!(report.state.total_items, 3);
    assert!(load_checkpoint(&config).is_file_processed("b.json"));
}

#[tokio::test]
async fn test_fresh_run_reprocesses_everything() {
    let dir = TempDir::new().unwrap();
    write_input(&dir, "a.json", TWO_COMPANIES);
    let config = create_test_config(&dir, 2);

    run_enrichment(config.clone(), Arc::new(ScriptedEnricher::default()), false)
        .await
        .unwrap();

    let enricher = Arc::new(ScriptedEnricher::default());
    run_enrichment(config.clone(), enricher.clone(), true)
        .await
        .unwrap();

    let mut calls = enricher.calls();
    calls.sort();
    assert_eq!(calls, vec!["1", "2"]);
}

#[tokio::test]
async fn test_scalar_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_input(&dir, "a.json", TWO_COMPANIES);
    write_input(&dir, "number.json", "42");
    write_input(&dir, "string.json", r#""not a record set""#);
    write_input(&dir, "notes.txt", r#"{"9": {"name": "Ignored"}}"#);
    let config = create_test_config(&dir, 2);

    let enricher = Arc::new(ScriptedEnricher::default());
    let report = run_enrichment(config.clone(), enricher.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(report.files_skipped, 2);

    let mut calls = enricher.calls();
    calls.sort();
    assert_eq!(calls, vec!["1", "2"]);

    let saved = load_checkpoint(&config);
    assert_eq!(
        saved.processed_files,
        HashSet::from(["a.json".to_string()])
    );
}

#[tokio::test]
async fn test_no_duplicate_dispatch_under_load() {
    let dir = TempDir::new().unwrap();

    // Two files: an object keyed by id and an array indexed by position
    let object: serde_json::Map<String, Value> = (0..30)
        .map(|n| (format!("c{}", n), json!({"name": format!("Company {}", n)})))
        .collect();
    write_input(&dir, "object.json", &Value::Object(object).to_string());
    let array: Vec<Value> = (0..20)
        .map(|n| json!({"name": format!("Other {}", n)}))
        .collect();
    write_input(&dir, "array.json", &Value::Array(array).to_string());

    let mut config = create_test_config(&dir, 4);
    config.pipeline.checkpoint_interval = 7;
    config.rate_limit.max_concurrent = Some(2);

    let enricher = Arc::new(ScriptedEnricher {
        delay: Some(Duration::from_millis(2)),
        ..Default::default()
    });

    let report = run_enrichment(config.clone(), enricher.clone(), false)
        .await
        .expect("Run failed");

    let calls = enricher.calls();
    let unique: HashSet<&String> = calls.iter().collect();
    assert_eq!(calls.len(), 50);
    assert_eq!(unique.len(), 50);

    assert_eq!(report.state.total_processed, 50);
    assert_eq!(read_records(&config.output.results_path).unwrap().len(), 50);

    let saved = load_checkpoint(&config);
    assert_eq!(saved.processed_count("ds", "object.json"), 30);
    assert_eq!(saved.processed_count("ds", "array.json"), 20);
    assert!(saved.is_item_processed("ds", "array.json", "19"));
    assert_eq!(saved.processed_files.len(), 2);
}

#[tokio::test]
async fn test_datasets_sharing_a_file_name() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(first.join("a.json"), "[]").unwrap();
    fs::write(second.join("a.json"), TWO_COMPANIES).unwrap();

    let mut config = create_test_config(&dir, 2);
    config.datasets = vec![
        DatasetEntry {
            label: "x".to_string(),
            directory: first,
        },
        DatasetEntry {
            label: "y".to_string(),
            directory: second,
        },
    ];

    // Item "2" of y fails, so y's a.json stays incomplete after x's copy is done
    let enricher = Arc::new(ScriptedEnricher::failing(&["2"]));
    let report = run_enrichment(config.clone(), enricher.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(report.failed_items, vec!["y:a.json:2".to_string()]);
    assert_eq!(enricher.call_counts()["1"], 1);

    let saved = load_checkpoint(&config);
    assert!(saved.is_file_complete("x", "a.json"));
    assert!(!saved.is_file_complete("y", "a.json"));
    assert!(saved.is_item_processed("y", "a.json", "1"));

    // The resumed run still scans y's a.json and finishes it
    let second_run = Arc::new(ScriptedEnricher::default());
    run_enrichment(config.clone(), second_run.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(second_run.calls(), vec!["2"]);

    let saved = load_checkpoint(&config);
    assert!(saved.is_file_complete("y", "a.json"));
    assert_eq!(saved.processed_count("y", "a.json"), 2);
    assert_eq!(saved.processed_count("x", "a.json"), 0);
    assert_eq!(result_items(&config.output.results_path), vec!["1", "2"]);
}

#[tokio::test]
async fn test_corrupt_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    write_input(&dir, "a.json", TWO_COMPANIES);
    let config = create_test_config(&dir, 1);

    fs::create_dir_all(&config.checkpoint.directory).unwrap();
    fs::write(
        config.checkpoint.directory.join("processing_state.json"),
        "{\"processed_files\": [",
    )
    .unwrap();

    let enricher = Arc::new(ScriptedEnricher::default());
    let report = run_enrichment(config.clone(), enricher.clone(), false)
        .await
        .expect("Run failed");

    assert_eq!(enricher.calls().len(), 2);
    assert_eq!(report.state.total_processed, 2);
    assert_eq!(load_checkpoint(&config).total_processed, 2);
}
