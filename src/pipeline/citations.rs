//! Citation marker cleanup for enrichment results
//!
//! Search-backed models append bracketed reference markers such as `[12]` or `[3, 7]` to
//! their text. They are stripped from every string in a result before it is stored.

use crate::enrich::EnrichedRecord;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Matches `[12]`, `[3, 7]` and the whitespace in front of them
static CITATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[\d+(?:\s*,\s*\d+)*\]").expect("valid citation pattern"));

/// Removes bracketed citation markers from `text`
///
/// Text without markers is returned unchanged. Otherwise the result is trimmed, since a
/// marker at the end usually leaves trailing whitespace behind. Applying this twice gives
/// the same result as applying it once.
pub fn remove_citations(text: &str) -> String {
    let mut current = text.to_string();

    // Removing one marker can bring digits together into a new one, e.g. "[[1]2]"
    loop {
        if !CITATION_PATTERN.is_match(&current) {
            return current;
        }
        current = CITATION_PATTERN.replace_all(&current, "").trim().to_string();
    }
}

/// Strips citation markers from every string in `value`, recursing into lists and objects
pub fn clean_value(value: &mut Value) {
    match value {
        Value::String(text) => *text = remove_citations(text),
        Value::Array(items) => items.iter_mut().for_each(clean_value),
        Value::Object(map) => map.values_mut().for_each(clean_value),
        _ => {}
    }
}

/// Strips citation markers from every string field of a record
pub fn clean_record(record: &mut EnrichedRecord) {
    record.values_mut().for_each(clean_value);
}
