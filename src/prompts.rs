//! Prompt rendering for model-backed prioritization.
//!
//! Provider-agnostic: produces one plain-text prompt from normalized tasks and
//! the caller's tuning.

use crate::task::Task;
use crate::tuning::TuningConfig;

// =============================================================================
// Template
// =============================================================================

/// Fixed pieces of a prioritization prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    /// Used when the caller gives no custom prompt.
    pub directive: &'static str,
    /// Output contract appended after the directive.
    pub response_shape: &'static str,
}

impl PromptTemplate {
    /// Directive, then the JSON contract, then the pretty-printed task list.
    pub fn render(&self, tasks: &[Task], config: &TuningConfig) -> String {
        let directive = config.custom_prompt().unwrap_or(self.directive);
        let tasks_json = serde_json::to_string_pretty(tasks).unwrap_or_else(|_| "[]".into());

        format!(
            "{directive}\n\n{shape}\n\nTasks:\n{tasks_json}",
            shape = self.response_shape.trim()
        )
    }
}

// =============================================================================
// Standard prompt
// =============================================================================

pub const PLANNER_V1: PromptTemplate = PromptTemplate {
    slug: "planner_v1",
    directive: "You are a strict academic planner. Prioritize tasks by due date urgency and module weighting.",
    response_shape: r#"
Return JSON only in this shape:
{
  "ratedTasks": [
    {
      "id": "string",
      "priorityScore": 0-100,
      "priorityBand": "critical|high|medium|low",
      "reason": "short reason"
    }
  ],
  "summary": "short summary"
}"#,
};

pub const DEFAULT_PROMPT: PromptTemplate = PLANNER_V1;

/// Render with [`DEFAULT_PROMPT`].
pub fn build_prompt(tasks: &[Task], config: &TuningConfig) -> String {
    DEFAULT_PROMPT.render(tasks, config)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::normalize_tasks;
    use serde_json::json;

    fn tasks() -> Vec<Task> {
        normalize_tasks(&json!([
            {"id": "essay", "title": "Apple essay", "module": "Business", "moduleWeightPercent": 40}
        ]))
    }

    #[test]
    fn default_directive_when_no_custom_prompt() {
        let p = build_prompt(&tasks(), &TuningConfig::default());
        assert!(p.starts_with("You are a strict academic planner."));
        assert!(p.contains("Return JSON only in this shape:"));
        assert!(p.contains("\"priorityBand\": \"critical|high|medium|low\""));
    }

    #[test]
    fn blank_custom_prompt_is_ignored() {
        let cfg = TuningConfig {
            custom_prompt: Some("   ".into()),
            ..Default::default()
        };
        assert!(build_prompt(&tasks(), &cfg).starts_with("You are a strict academic planner."));
    }

    #[test]
    fn custom_prompt_is_trimmed_and_used() {
        let cfg = TuningConfig {
            custom_prompt: Some("  Favour career tasks.  ".into()),
            ..Default::default()
        };
        let p = build_prompt(&tasks(), &cfg);
        assert!(p.starts_with("Favour career tasks.\n\nReturn JSON only"));
        assert!(!p.contains("strict academic planner"));
    }

    #[test]
    fn task_list_is_appended_last() {
        let p = build_prompt(&tasks(), &TuningConfig::default());
        let (_, tail) = p.split_once("Tasks:\n").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(tail).unwrap();
        assert_eq!(parsed[0]["id"], "essay");
        assert_eq!(parsed[0]["moduleWeightPercent"], 40.0);
    }

    #[test]
    fn rendering_is_deterministic() {
        let cfg = TuningConfig::default();
        assert_eq!(build_prompt(&tasks(), &cfg), build_prompt(&tasks(), &cfg));
    }
}
