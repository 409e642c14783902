//! Pulling a JSON object out of model output
//!
//! Chat models wrap their answer in reasoning traces and markdown fences. The extraction
//! order is:
//! 1. Drop everything up to the last `</think>` marker
//! 2. Strip a surrounding ``` / ```json fence
//! 3. Parse the remainder as a JSON object
//! 4. Otherwise parse the span between the first `{` and the last `}`

use crate::enrich::EnrichError;
use serde_json::{Map, Value};

const THINK_END: &str = "</think>";

/// Extracts the JSON object embedded in `content`
pub fn extract_json_object(content: &str) -> Result<Map<String, Value>, EnrichError> {
    let mut text = content.trim();

    if let Some(idx) = text.rfind(THINK_END) {
        text = text[idx + THINK_END.len()..].trim();
    }

    let text = strip_code_fence(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            match serde_json::from_str::<Value>(&text[start..=end]) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(EnrichError::MalformedResponse(
                    "embedded JSON is not an object".to_string(),
                )),
                Err(e) => Err(EnrichError::MalformedResponse(format!(
                    "failed to parse embedded JSON: {}",
                    e
                ))),
            }
        }
        _ => Err(EnrichError::MalformedResponse(
            "no JSON object found in content".to_string(),
        )),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // The opening fence line may carry a language tag
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
