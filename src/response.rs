//! Decoding model output into a [`PriorityResult`].
//!
//! Two steps: strip an optional markdown code fence, then reconcile the parsed
//! ratings against the tasks we actually sent.
//!
//! Fence grammar, applied after trimming surrounding whitespace:
//!
//! ```text
//! response := [ "```" [ tag ] ws ] body [ ws "```" ]
//! tag      := [A-Za-z0-9_+.-]+
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::rating::{PriorityBand, PriorityResult, RatedTask};
use crate::task::{coerce_number, coerce_text, Task};

const FENCE: &str = "```";

#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("model response is empty")]
    Empty,
    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl ResponseError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty_response",
            Self::Malformed(_) => "malformed_response",
        }
    }
}

// =============================================================================
// Fence decoding
// =============================================================================

/// Strip a leading and/or trailing code fence.
///
/// Text without fences is returned trimmed and otherwise untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut body = raw.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !is_tag_char(c))
            .unwrap_or(rest.len());
        let after_tag = &rest[tag_len..];
        // A tag only counts if whitespace separates it from the body.
        body = if tag_len > 0 && after_tag.starts_with(char::is_whitespace) {
            after_tag.trim_start()
        } else {
            rest.trim_start()
        };
    }

    if let Some(rest) = body.strip_suffix(FENCE) {
        body = rest.trim_end();
    }

    body
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-')
}

/// Parse model text as JSON.
///
/// The fenced body is tried first. If that fails, the first balanced JSON
/// object in the text is tried, for models that wrap the answer in prose.
pub fn decode_json(raw: &str) -> Result<Value, ResponseError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ResponseError::Empty);
    }

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first) => extract_object(body)
            .and_then(|obj| serde_json::from_str(obj).ok())
            .ok_or_else(|| ResponseError::Malformed(first.to_string())),
    }
}

/// First balanced `{...}` in `s`, ignoring braces inside JSON strings.
fn extract_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let rest = &s[start..];
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in rest.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' && in_string {
            escape = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile parsed model output with the known task set.
///
/// - entries naming an unknown `id` are dropped
/// - scores are rounded and clamped to 0-100 (missing or non-numeric is 0)
/// - a band is kept only if it is one of the four known names
/// - task fields always come from `tasks`, never from the model
pub fn reconcile(output: &Value, tasks: &[Task], provider: &str) -> PriorityResult {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let rated = output
        .get("ratedTasks")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| rate_entry(entry, &by_id, provider))
                .collect()
        })
        .unwrap_or_default();

    let summary = output
        .get("summary")
        .map(coerce_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{provider} prioritization complete"));

    PriorityResult::ranked(rated, summary)
}

fn rate_entry(entry: &Value, by_id: &HashMap<&str, &Task>, provider: &str) -> Option<RatedTask> {
    let id = entry.get("id").map(coerce_text).unwrap_or_default();
    let task = by_id.get(id.as_str())?;

    let priority_score = entry
        .get("priorityScore")
        .and_then(coerce_number)
        .unwrap_or(0.0)
        .round()
        .clamp(0.0, 100.0) as u8;

    let priority_band = entry
        .get("priorityBand")
        .and_then(Value::as_str)
        .and_then(PriorityBand::parse)
        .unwrap_or_else(|| PriorityBand::from_score(priority_score));

    let reason = entry
        .get("reason")
        .map(coerce_text)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| format!("{provider} rating"));

    Some(RatedTask {
        task: (*task).clone(),
        priority_score,
        priority_band,
        reason,
    })
}

/// Decode and reconcile in one step.
pub fn parse_model_output(
    raw: &str,
    tasks: &[Task],
    provider: &str,
) -> Result<PriorityResult, ResponseError> {
    let value = decode_json(raw)?;
    Ok(reconcile(&value, tasks, provider))
}
