//! Rated output types shared by every tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

// =============================================================================
// Bands
// =============================================================================

/// Categorical priority derived from a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBand {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityBand {
    pub const ALL: [PriorityBand; 4] = [
        PriorityBand::Critical,
        PriorityBand::High,
        PriorityBand::Medium,
        PriorityBand::Low,
    ];

    /// Thresholds are checked highest first: 85, 70, 45.
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => PriorityBand::Critical,
            70..=84 => PriorityBand::High,
            45..=69 => PriorityBand::Medium,
            _ => PriorityBand::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityBand::Critical => "critical",
            PriorityBand::High => "high",
            PriorityBand::Medium => "medium",
            PriorityBand::Low => "low",
        }
    }

    /// Exact, case-sensitive match against the four wire names.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }
}

/// Band for a score.
pub fn score_band(score: u8) -> PriorityBand {
    PriorityBand::from_score(score)
}

// =============================================================================
// Rated tasks and results
// =============================================================================

/// A canonical task plus its rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedTask {
    #[serde(flatten)]
    pub task: Task,
    pub priority_score: u8,
    pub priority_band: PriorityBand,
    pub reason: String,
}

impl RatedTask {
    pub fn id(&self) -> &str {
        &self.task.id
    }
}

/// Ranked tasks plus a one-line account of how they were produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityResult {
    #[serde(default)]
    pub rated_tasks: Vec<RatedTask>,
    #[serde(default)]
    pub summary: String,
}

impl PriorityResult {
    /// Build a result, sorting tasks by descending score.
    pub fn ranked(mut rated_tasks: Vec<RatedTask>, summary: impl Into<String>) -> Self {
        sort_by_priority(&mut rated_tasks);
        Self {
            rated_tasks,
            summary: summary.into(),
        }
    }

    pub fn empty(summary: impl Into<String>) -> Self {
        Self {
            rated_tasks: Vec::new(),
            summary: summary.into(),
        }
    }
}

/// Descending by score. `sort_by` is stable, so ties keep input order.
pub fn sort_by_priority(tasks: &mut [RatedTask]) {
    tasks.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
}

// =============================================================================
// Provenance
// =============================================================================

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultMode {
    /// Remote priority backend answered.
    Live,
    /// The generative model was called directly.
    Direct,
    /// Deterministic heuristic (or the empty short-circuit).
    Mock,
}

impl ResultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultMode::Live => "live",
            ResultMode::Direct => "direct",
            ResultMode::Mock => "mock",
        }
    }
}

/// A result annotated with where it came from; this is what gets served and
/// snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityReport {
    #[serde(flatten)]
    pub result: PriorityResult,
    pub mode: ResultMode,
    pub provider: String,
    pub model: String,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Snapshot location, set by the server on what it persists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}
