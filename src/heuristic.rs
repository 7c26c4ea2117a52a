//! Deterministic urgency/impact/effort scorer.
//!
//! This is the tier of last resort: it never fails and depends only on its
//! inputs plus the instant passed in as `now`.

use chrono::{DateTime, Utc};

use crate::rating::{score_band, PriorityResult, RatedTask};
use crate::task::Task;
use crate::tuning::{NormalizedWeights, PriorityWeights};

/// Days-left stand-in for tasks without a deadline.
pub const NO_DEADLINE_DAYS: i64 = 999;

pub const HEURISTIC_SUMMARY: &str = "Heuristic fallback mode used";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Whole days until `due_at`, rounded up. Past deadlines are negative.
pub fn days_until(due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(due) = due_at else {
        return NO_DEADLINE_DAYS;
    };
    let millis = due.signed_duration_since(now).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY).ceil() as i64
}

/// Component scores on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Components {
    pub days_left: i64,
    pub urgency: f64,
    pub impact: f64,
    pub effort: f64,
}

impl Components {
    pub fn for_task(task: &Task, now: DateTime<Utc>) -> Self {
        let days_left = days_until(task.due_at, now);
        Self {
            days_left,
            urgency: (100.0 - days_left as f64 * 9.0).clamp(0.0, 100.0),
            impact: (task.module_weight_percent * 2.2).clamp(0.0, 100.0),
            effort: (task.estimated_hours * 10.0).clamp(0.0, 100.0),
        }
    }

    /// Weighted blend, rounded and kept inside 0-100.
    pub fn score(&self, w: &NormalizedWeights) -> u8 {
        let raw = w.deadline * self.urgency + w.module * self.impact + w.effort * self.effort;
        if !raw.is_finite() {
            return 0;
        }
        raw.round().clamp(0.0, 100.0) as u8
    }
}

/// Rate a single task.
pub fn rate_task(task: &Task, weights: &NormalizedWeights, now: DateTime<Utc>) -> RatedTask {
    let components = Components::for_task(task, now);
    let priority_score = components.score(weights);

    RatedTask {
        task: task.clone(),
        priority_score,
        priority_band: score_band(priority_score),
        reason: format!(
            "Due in {} day(s), module weight {}%",
            components.days_left, task.module_weight_percent
        ),
    }
}

/// Rate and rank every task.
pub fn heuristic_priority(
    tasks: &[Task],
    weights: &PriorityWeights,
    now: DateTime<Utc>,
) -> PriorityResult {
    let normalized = weights.normalized();
    let rated = tasks
        .iter()
        .map(|task| rate_task(task, &normalized, now))
        .collect();
    PriorityResult::ranked(rated, HEURISTIC_SUMMARY)
}
