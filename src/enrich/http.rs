//! HTTP chat-completion enricher
//!
//! Sends each record to an OpenAI-compatible `chat/completions` endpoint and parses the JSON
//! object out of the first choice's message content.

use crate::config::EnrichmentConfig;
use crate::enrich::extract::extract_json_object;
use crate::enrich::{
    EnrichContext, EnrichError, EnrichResult, EnrichedRecord, Enricher, ResultSchema,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const USER_AGENT: &str = concat!("batch-enrich/", env!("CARGO_PKG_VERSION"));

/// Enricher backed by a chat-completion HTTP API
pub struct HttpEnricher {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
    timeout_secs: u64,
    instructions: Option<String>,
    schema: ResultSchema,
}

impl HttpEnricher {
    /// Builds an enricher, reading the bearer token from the configured environment variable
    pub fn from_config(config: &EnrichmentConfig) -> EnrichResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EnrichError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(config, api_key)
    }

    /// Builds an enricher with an explicit bearer token
    pub fn new(config: &EnrichmentConfig, api_key: impl Into<String>) -> EnrichResult<Self> {
        let client = build_http_client(config.timeout())?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            instructions: config.instructions.clone(),
            schema: ResultSchema::new(config.fields.clone()),
        })
    }

    fn request_body(&self, payload: &Value, base_data: Option<&Value>) -> Value {
        let mut messages = Vec::new();

        if let Some(instructions) = &self.instructions {
            messages.push(json!({"role": "system", "content": instructions}));
        }

        if let Some(base) = base_data {
            messages.push(json!({
                "role": "user",
                "content": format!("Reference data:\n{}", base),
            }));
        }

        messages.push(json!({"role": "user", "content": payload.to_string()}));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }

    async fn send(&self, body: &Value) -> EnrichResult<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| EnrichError::MalformedResponse(format!("response is not JSON: {}", e)))
    }
}

/// Builds an HTTP client for the enrichment endpoint
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Reads `choices[0].message.content` into a record
///
/// Content is normally a string holding JSON, but some providers return the object directly.
fn record_from_completion(completion: &Value) -> EnrichResult<EnrichedRecord> {
    let content = completion
        .pointer("/choices/0/message/content")
        .ok_or_else(|| {
            EnrichError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

    match content {
        Value::String(text) => Ok(EnrichedRecord::from_map(extract_json_object(text)?)),
        Value::Object(_) => EnrichedRecord::try_from(content.clone()),
        _ => Err(EnrichError::MalformedResponse(
            "message content is neither text nor an object".to_string(),
        )),
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    async fn enrich(
        &self,
        ctx: &EnrichContext<'_>,
        payload: &Value,
    ) -> EnrichResult<EnrichedRecord> {
        let body = self.request_body(payload, ctx.base_data);

        tracing::debug!(
            worker = ctx.worker_id,
            item = ctx.item_id,
            endpoint = %self.endpoint,
            "Sending enrichment request"
        );

        let completion = self.send(&body).await.map_err(|e| match e {
            EnrichError::Http(err) if err.is_timeout() => EnrichError::Timeout {
                secs: self.timeout_secs,
            },
            other => other,
        })?;

        let record = record_from_completion(&completion)?;
        self.schema.validate(&record)?;
        Ok(record)
    }

    fn name(&self) -> &str {
        "http"
    }
}
