use crate::config::types::{
    Config, DatasetEntry, EnrichmentConfig, FieldEntry, PipelineConfig, RateLimitConfig,
    RetryConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_enrichment_config(&config.enrichment)?;
    validate_datasets(&config.datasets)?;

    if config.output.results_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "results_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue_capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "max_requests must be >= 1, got {}",
            config.max_requests
        )));
    }

    if !config.period_secs.is_finite() || config.period_secs <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "period_secs must be a positive number, got {}",
            config.period_secs
        )));
    }

    if config.max_concurrent == Some(0) {
        return Err(ConfigError::Validation(
            "max_concurrent must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 16 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 16, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_enrichment_config(config: &EnrichmentConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "Endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.model.is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    validate_fields(&config.fields)
}

fn validate_fields(fields: &[FieldEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "Result field name cannot be empty".to_string(),
            ));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Result field '{}' declared more than once",
                field.name
            )));
        }
    }
    Ok(())
}

fn validate_datasets(datasets: &[DatasetEntry]) -> Result<(), ConfigError> {
    if datasets.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[dataset]] entry is required".to_string(),
        ));
    }

    let mut labels = HashSet::new();
    for dataset in datasets {
        validate_label(&dataset.label)?;

        if !labels.insert(dataset.label.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Dataset label '{}' is used more than once",
                dataset.label
            )));
        }

        if dataset.directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Dataset '{}' must name a directory",
                dataset.label
            )));
        }
    }

    Ok(())
}

/// Labels become the first half of `<label>:<file>` checkpoint keys
fn validate_label(label: &str) -> Result<(), ConfigError> {
    if label.is_empty() {
        return Err(ConfigError::Validation(
            "Dataset label cannot be empty".to_string(),
        ));
    }

    if label.contains(':') {
        return Err(ConfigError::Validation(format!(
            "Dataset label '{}' cannot contain ':'",
            label
        )));
    }

    Ok(())
}
