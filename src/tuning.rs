//! Caller-supplied tuning (`llmConfig` on the wire).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::task::coerce_number;

pub const DEFAULT_DEADLINE_WEIGHT: f64 = 0.55;
pub const DEFAULT_MODULE_WEIGHT: f64 = 0.35;
pub const DEFAULT_EFFORT_WEIGHT: f64 = 0.10;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Relative weights for the heuristic scorer. Not required to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityWeights {
    #[serde(
        default = "default_deadline_weight",
        deserialize_with = "lenient_deadline_weight"
    )]
    pub deadline_weight: f64,
    #[serde(
        default = "default_module_weight",
        deserialize_with = "lenient_module_weight"
    )]
    pub module_weight: f64,
    #[serde(
        default = "default_effort_weight",
        deserialize_with = "lenient_effort_weight"
    )]
    pub effort_weight: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            deadline_weight: DEFAULT_DEADLINE_WEIGHT,
            module_weight: DEFAULT_MODULE_WEIGHT,
            effort_weight: DEFAULT_EFFORT_WEIGHT,
        }
    }
}

/// Weights rescaled to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedWeights {
    pub deadline: f64,
    pub module: f64,
    pub effort: f64,
}

impl PriorityWeights {
    /// Divide each weight by the raw sum. A zero sum is treated as 1, so the
    /// weights are used as-is rather than dividing by zero.
    pub fn normalized(&self) -> NormalizedWeights {
        let raw = self.deadline_weight + self.module_weight + self.effort_weight;
        let total = if raw == 0.0 || !raw.is_finite() { 1.0 } else { raw };
        NormalizedWeights {
            deadline: self.deadline_weight / total,
            module: self.module_weight / total,
            effort: self.effort_weight / total,
        }
    }
}

fn default_deadline_weight() -> f64 {
    DEFAULT_DEADLINE_WEIGHT
}

fn default_module_weight() -> f64 {
    DEFAULT_MODULE_WEIGHT
}

fn default_effort_weight() -> f64 {
    DEFAULT_EFFORT_WEIGHT
}

fn lenient_number<'de, D>(deserializer: D, fallback: f64) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value).unwrap_or(fallback))
}

fn lenient_deadline_weight<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    lenient_number(d, DEFAULT_DEADLINE_WEIGHT)
}

fn lenient_module_weight<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    lenient_number(d, DEFAULT_MODULE_WEIGHT)
}

fn lenient_effort_weight<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    lenient_number(d, DEFAULT_EFFORT_WEIGHT)
}

fn lenient_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

fn lenient_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn lenient_weights<'de, D>(deserializer: D) -> Result<PriorityWeights, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(PriorityWeights::default());
    }
    PriorityWeights::deserialize(value).map_err(serde::de::Error::custom)
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Model and scoring configuration for one prioritization request.
///
/// Fields are read leniently: wrong-typed values fall back to defaults rather
/// than rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningConfig {
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_prompt: Option<String>,
    #[serde(default, deserialize_with = "lenient_weights")]
    pub tuning: PriorityWeights,
    /// Credential for the direct model tier. Never serialized.
    #[serde(default, deserialize_with = "lenient_opt_text", skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default, deserialize_with = "truthy", skip_serializing)]
    pub allow_direct_api: bool,
}

/// The subset of [`TuningConfig`] forwarded to a priority backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<&'a str>,
    pub tuning: PriorityWeights,
}

impl TuningConfig {
    /// Requested model, or `default` when unset or blank.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default)
    }

    /// Temperature clamped to [0, 1].
    pub fn temperature(&self) -> f64 {
        self.temperature
            .unwrap_or(DEFAULT_TEMPERATURE)
            .clamp(0.0, 1.0)
    }

    /// Trimmed custom prompt, if one was given.
    pub fn custom_prompt(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Caller credential for the direct tier, only when direct calls are allowed.
    pub fn direct_api_key(&self) -> Option<&str> {
        if !self.allow_direct_api {
            return None;
        }
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Prompt-relevant fields only; the credential never leaves the caller.
    pub fn for_backend(&self) -> BackendConfig<'_> {
        BackendConfig {
            model: self.model.as_deref(),
            temperature: self.temperature(),
            custom_prompt: self.custom_prompt.as_deref(),
            tuning: self.tuning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let cfg: TuningConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(cfg.tuning, PriorityWeights::default());
        assert_eq!(cfg.temperature(), 0.2);
        assert_eq!(cfg.model_or("gemini-1.5-pro"), "gemini-1.5-pro");
        assert!(cfg.direct_api_key().is_none());
    }

    #[test]
    fn weights_are_read_leniently() {
        let cfg: TuningConfig = serde_json::from_value(json!({
            "tuning": {"deadlineWeight": "1", "moduleWeight": "heavy", "effortWeight": null}
        }))
        .unwrap();
        assert_eq!(cfg.tuning.deadline_weight, 1.0);
        assert_eq!(cfg.tuning.module_weight, DEFAULT_MODULE_WEIGHT);
        assert_eq!(cfg.tuning.effort_weight, DEFAULT_EFFORT_WEIGHT);

        let cfg: TuningConfig = serde_json::from_value(json!({"tuning": 3})).unwrap();
        assert_eq!(cfg.tuning, PriorityWeights::default());
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        let w = PriorityWeights {
            deadline_weight: 2.0,
            module_weight: 1.0,
            effort_weight: 1.0,
        }
        .normalized();
        assert_eq!(w.deadline, 0.5);
        assert_eq!(w.module, 0.25);
        assert_eq!(w.effort, 0.25);
    }

    #[test]
    fn zero_weights_do_not_divide_by_zero() {
        let w = PriorityWeights {
            deadline_weight: 0.0,
            module_weight: 0.0,
            effort_weight: 0.0,
        }
        .normalized();
        assert_eq!((w.deadline, w.module, w.effort), (0.0, 0.0, 0.0));
    }

    #[test]
    fn temperature_is_clamped() {
        let cfg: TuningConfig = serde_json::from_value(json!({"temperature": 3})).unwrap();
        assert_eq!(cfg.temperature(), 1.0);
    }

    #[test]
    fn direct_key_requires_opt_in() {
        let cfg: TuningConfig = serde_json::from_value(json!({"apiKey": "k"})).unwrap();
        assert!(cfg.direct_api_key().is_none());

        let cfg: TuningConfig =
            serde_json::from_value(json!({"apiKey": " k ", "allowDirectApi": true})).unwrap();
        assert_eq!(cfg.direct_api_key(), Some("k"));
    }

    #[test]
    fn backend_config_never_carries_the_key() {
        let cfg: TuningConfig = serde_json::from_value(json!({
            "model": "gemini-1.5-flash",
            "customPrompt": "be strict",
            "apiKey": "secret",
            "allowDirectApi": true
        }))
        .unwrap();
        let v = serde_json::to_value(cfg.for_backend()).unwrap();
        assert_eq!(v["model"], "gemini-1.5-flash");
        assert_eq!(v["customPrompt"], "be strict");
        assert_eq!(v["tuning"]["deadlineWeight"], 0.55);
        assert!(v.get("apiKey").is_none());

        let full = serde_json::to_value(&cfg).unwrap();
        assert!(full.get("apiKey").is_none());
    }
}
