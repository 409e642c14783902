//! HTTP enricher tests
//!
//! These tests use wiremock to stand in for the chat-completion endpoint.

use batch_enrich::config::{EnrichmentConfig, FieldEntry, FieldKind};
use batch_enrich::enrich::{EnrichContext, EnrichError, Enricher, HttpEnricher};
use batch_enrich::pipeline::RateLimiter;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(server: &MockServer) -> EnrichmentConfig {
    EnrichmentConfig {
        endpoint: format!("{}/chat/completions", server.uri()),
        model: "sonar-pro".to_string(),
        api_key_env: "BATCH_ENRICH_TEST_KEY".to_string(),
        timeout_secs: 5,
        temperature: 0.01,
        instructions: Some("Describe the company as JSON.".to_string()),
        base_data_path: None,
        fields: vec![
            FieldEntry {
                name: "company_name".to_string(),
                kind: FieldKind::String,
            },
            FieldEntry {
                name: "uniqueness_score".to_string(),
                kind: FieldKind::Integer,
            },
        ],
    }
}

fn completion(content: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "cmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

async fn enrich_once(
    enricher: &HttpEnricher,
    payload: Value,
) -> Result<batch_enrich::EnrichedRecord, EnrichError> {
    let limiter = RateLimiter::new(10, Duration::from_secs(1));
    let ctx = EnrichContext {
        worker_id: 0,
        item_id: "1",
        limiter: &limiter,
        base_data: None,
    };
    enricher.enrich(&ctx, &payload).await
}

#[tokio::test]
async fn test_enrich_parses_fenced_content_after_reasoning() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "sonar-pro"})))
        .respond_with(completion(json!(
            "<think>Let me look this up.</think>\n```json\n{\"company_name\": \"Acme\", \"uniqueness_score\": 8}\n```"
        )))
        .expect(1)
        .mount(&server)
        .await;

    let enricher = HttpEnricher::new(&create_test_config(&server), "test-key").unwrap();
    let record = enrich_once(&enricher, json!({"name": "Acme"}))
        .await
        .expect("Enrichment failed");

    assert_eq!(record.get("company_name"), Some(&json!("Acme")));
    assert_eq!(record.get("uniqueness_score"), Some(&json!(8)));
}

#[tokio::test]
async fn test_enrich_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let enricher = HttpEnricher::new(&create_test_config(&server), "test-key").unwrap();
    let err = enrich_once(&enricher, json!({"name": "Acme"}))
        .await
        .unwrap_err();

    match err {
        EnrichError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_enrich_schema_violation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(json!(
            "{\"company_name\": \"Acme\", \"uniqueness_score\": \"very\"}"
        )))
        .mount(&server)
        .await;

    let enricher = HttpEnricher::new(&create_test_config(&server), "test-key").unwrap();
    let err = enrich_once(&enricher, json!({"name": "Acme"}))
        .await
        .unwrap_err();

    assert!(matches!(err, EnrichError::Schema(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_enrich_unparseable_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(json!("I could not find this company.")))
        .mount(&server)
        .await;

    let enricher = HttpEnricher::new(&create_test_config(&server), "test-key").unwrap();
    let err = enrich_once(&enricher, json!({"name": "Nobody"}))
        .await
        .unwrap_err();

    assert!(matches!(err, EnrichError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_enrich_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            completion(json!("{\"company_name\": \"Late\", \"uniqueness_score\": 1}"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.timeout_secs = 1;
    let enricher = HttpEnricher::new(&config, "test-key").unwrap();
    let err = enrich_once(&enricher, json!({"name": "Late"}))
        .await
        .unwrap_err();

    assert!(matches!(err, EnrichError::Timeout { secs: 1 }), "got {:?}", err);
}

#[tokio::test]
async fn test_pipeline_with_http_enricher() {
    use batch_enrich::config::{Config, DatasetEntry, OutputConfig};
    use batch_enrich::output::read_records;
    use batch_enrich::pipeline::run_enrichment;
    use std::sync::Arc;
    use tempfile::TempDir;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(json!(
            "{\"company_name\": \"Acme [1]\", \"uniqueness_score\": 6}"
        )))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir(&input).unwrap();
    std::fs::write(
        input.join("companies.json"),
        r#"[{"name": "A"}, {"name": "B"}, {"name": "C"}]"#,
    )
    .unwrap();

    let mut config = Config {
        pipeline: Default::default(),
        checkpoint: Default::default(),
        rate_limit: Default::default(),
        retry: Default::default(),
        enrichment: create_test_config(&server),
        output: OutputConfig {
            results_path: dir.path().join("results.json"),
        },
        datasets: vec![DatasetEntry {
            label: "startups".to_string(),
            directory: input,
        }],
    };
    config.pipeline.workers = 2;
    config.checkpoint.directory = dir.path().join("checkpoints");

    let enricher = HttpEnricher::new(&config.enrichment, "test-key").unwrap();
    let report = run_enrichment(config.clone(), Arc::new(enricher), false)
        .await
        .expect("Run failed");

    assert_eq!(report.state.total_processed, 3);
    assert!(report.state.is_file_processed("companies.json"));

    let records = read_records(&config.output.results_path).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r["company_name"] == "Acme"));
}
