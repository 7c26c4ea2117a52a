//! Canonical task shape and the normalizer that produces it.
//!
//! Normalization is total: any JSON value maps to a (possibly empty) list of
//! well-formed [`Task`]s. Nothing in here returns an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module assigned to tasks that don't name one.
pub const DEFAULT_MODULE: &str = "General";

/// A task in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_module")]
    pub module: String,
    /// `None` means "no usable deadline"; scoring treats it as far future.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub module_weight_percent: f64,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub notes: String,
}

fn default_module() -> String {
    DEFAULT_MODULE.to_string()
}

/// Normalize a loosely-typed task list.
///
/// Anything that isn't a JSON array yields an empty list. Each element is
/// mapped positionally via [`normalize_task`].
pub fn normalize_tasks(raw: &Value) -> Vec<Task> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_task(index, item))
        .collect()
}

/// Normalize one record found at 0-based `index`.
///
/// Synthesized labels are 1-based (`task-1`, `Task 1`).
pub fn normalize_task(index: usize, item: &Value) -> Task {
    let position = index + 1;
    let module = field(item, "module").map(coerce_text);

    Task {
        id: field(item, "id")
            .map(coerce_text)
            .unwrap_or_else(|| format!("task-{position}")),
        title: field(item, "title")
            .map(coerce_text)
            .or_else(|| module.clone())
            .unwrap_or_else(|| format!("Task {position}")),
        module: module.unwrap_or_else(default_module),
        due_at: field(item, "dueAt").and_then(parse_due_at),
        module_weight_percent: field(item, "moduleWeightPercent")
            .and_then(coerce_number)
            .unwrap_or(0.0),
        estimated_hours: field(item, "estimatedHours")
            .and_then(coerce_number)
            .unwrap_or(0.0),
        notes: field(item, "notes").map(coerce_text).unwrap_or_default(),
    }
}

/// Look up a key, treating explicit `null` the same as absence.
fn field<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    item.get(key).filter(|v| !v.is_null())
}

/// Render any JSON value as display text.
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a JSON value to a finite number.
///
/// Accepts numbers, numeric strings (blank strings count as zero) and
/// booleans. Returns `None` for anything else, including NaN/infinite results,
/// so callers pick their own default instead of propagating a sentinel.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok()?
            }
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };

    n.is_finite().then_some(n)
}

/// Parse a deadline.
///
/// Strings may be RFC 3339, a naive date-time (read as UTC) or a bare
/// `YYYY-MM-DD` (UTC midnight). Numbers are epoch milliseconds; zero and
/// blank strings mean "no deadline".
pub fn parse_due_at(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_text(s.trim()),
        Value::Number(n) => {
            let ms = n.as_f64()?;
            if ms == 0.0 || !ms.is_finite() {
                return None;
            }
            Utc.timestamp_millis_opt(ms.trunc() as i64).single()
        }
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
