//! Recovers the JSON array of candidate entries from free-form model output.
//!
//! Models wrap their answer in code fences, prefix it with prose, or return it bare. Each
//! shape is handled by a pure strategy that proposes a slice of text; the first proposal
//! that parses as a JSON array wins.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, TaxExtractorError};
use crate::schema::CandidateEntry;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(\[.*?\])\s*```").unwrap());

static OBJECT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*(?:,\s*\{.*?\}\s*)*\]").unwrap());

/// A way of locating the array inside raw output.
pub type Strategy = fn(&str) -> Option<String>;

/// Strategies in priority order.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("fenced block", fenced_block),
    ("object list", object_list),
    ("outer brackets", outer_brackets),
    ("whole text", whole_text),
];

/// Inner content of a ```json fenced block.
pub fn fenced_block(raw: &str) -> Option<String> {
    FENCED_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First bracketed list of objects, for answers that start with prose.
pub fn object_list(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return None;
    }
    OBJECT_LIST.find(trimmed).map(|m| m.as_str().to_string())
}

/// Span from the first `[` to the last `]`.
pub fn outer_brackets(raw: &str) -> Option<String> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (start < end).then(|| raw[start..=end].to_string())
}

pub fn whole_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parses raw model output into candidate entries.
///
/// Blank output means the model found nothing and yields an empty list. Output that no
/// strategy can turn into a JSON array is an error, which callers treat as fatal for the run.
pub fn parse_model_output(raw: &str) -> Result<Vec<CandidateEntry>> {
    if raw.trim().is_empty() {
        debug!("Model output is blank, treating as no entries");
        return Ok(Vec::new());
    }

    let mut last_error = None;
    for (name, strategy) in STRATEGIES {
        let Some(candidate) = strategy(raw) else {
            continue;
        };
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Array(entries)) => {
                debug!("Parsed {} candidate entries via {}", entries.len(), name);
                return Ok(entries);
            }
            Ok(other) => {
                last_error = Some(format!("expected a JSON array, found {}", kind_of(&other)));
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    let reason = last_error.unwrap_or_else(|| "no JSON array found".to_string());
    warn!("Model output could not be parsed: {}", reason);
    Err(TaxExtractorError::UnparseableResponse(reason))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
