//! Turns a free-form model completion into a validated [`ScoreResult`].
//!
//! The pipeline is: strip markdown fences, isolate the first balanced JSON
//! object, parse it, then check every required field. Any violation rejects
//! the whole reply; only `highlights`/`improvements` may default to empty.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Rubric, ScoreResult};

const SNIPPET_LIMIT: usize = 120;
const OVERALL_KEYS: [&str; 2] = ["overallScore", "overall_score"];
const MIN_SCORE: f64 = 0.0;
const MAX_SCORE: f64 = 10.0;

/// Leading ```` ``` ````/```` ```json ```` marker or trailing ```` ``` ````, each optional.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\A\s*```(?:json)?|```\s*\z").expect("fence pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no JSON object found in model reply")]
    NoJsonFound,

    #[error("malformed JSON in model reply ({reason}): {snippet}")]
    MalformedJson { snippet: String, reason: String },

    #[error("invalid or missing field: {0}")]
    InvalidField(String),
}

impl ParseError {
    pub fn user_message(&self) -> String {
        match self {
            ParseError::NoJsonFound => {
                "⚠️ The judge did not return a structured evaluation. Please try again.".to_string()
            }
            ParseError::MalformedJson { .. } => {
                "⚠️ The judge returned an unreadable evaluation. Please try again.".to_string()
            }
            ParseError::InvalidField(name) => {
                format!("⚠️ The judge's evaluation had an invalid '{}' field. Please try again.", name)
            }
        }
    }
}

/// Sanitize a raw model reply and validate it against `rubric`.
pub fn sanitize_and_parse(raw_text: &str, rubric: Rubric) -> Result<ScoreResult, ParseError> {
    let stripped = strip_fences(raw_text);
    let payload = extract_json_object(&stripped).ok_or(ParseError::NoJsonFound)?;

    // payload is brace-delimited, so any successful parse is an object
    let map: Map<String, Value> =
        serde_json::from_str(payload).map_err(|e| ParseError::MalformedJson {
            snippet: truncate(payload, SNIPPET_LIMIT),
            reason: e.to_string(),
        })?;

    validate(&map, rubric)
}

/// Remove a markdown code fence at either end, then trim surrounding whitespace.
///
/// Idempotent: stripping already-stripped text returns it unchanged.
pub fn strip_fences(text: &str) -> String {
    FENCE.replace_all(text, "").trim().to_string()
}

/// Return the first top-level balanced `{...}` region of `text`.
///
/// Braces inside JSON string literals are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn validate(map: &Map<String, Value>, rubric: Rubric) -> Result<ScoreResult, ParseError> {
    let mut criteria = BTreeMap::new();
    for &name in rubric.criteria() {
        let score = read_score(map.get(name)).ok_or_else(|| invalid(name))?;
        criteria.insert(name.to_string(), score);
    }

    let overall = OVERALL_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()));
    let overall_score = read_score(overall).ok_or_else(|| invalid(OVERALL_KEYS[0]))?;

    let feedback = map
        .get("feedback")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid("feedback"))?
        .to_string();

    let highlights = read_string_list(map, "highlights")?;
    let improvements = read_string_list(map, "improvements")?;

    let grade = if rubric.allows_grade() {
        match map.get("grade") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(invalid("grade")),
        }
    } else {
        None
    };

    Ok(ScoreResult {
        criteria,
        overall_score,
        feedback,
        highlights,
        improvements,
        grade,
    })
}

fn read_score(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(v))
}

fn read_string_list(map: &Map<String, Value>, key: &str) -> Result<Vec<String>, ParseError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid(key)))
            .collect(),
        Some(_) => Err(invalid(key)),
    }
}

fn invalid(name: &str) -> ParseError {
    ParseError::InvalidField(name.to_string())
}

fn truncate(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() { format!("{}…", head) } else { head }
}
