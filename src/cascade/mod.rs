//! Single-pass fallback over an ordered list of tiers.
//!
//! Each tier either produces a result or fails with a [`TierFailure`]; the
//! failures seen so far are handed to the next tier so it can explain why it
//! ran. The last tier in a standard chain is the heuristic, which never fails.
//!
//! ```text
//! client:  Backend -> Direct API (opt-in) -> Heuristic
//! server:  Direct API (server key)        -> Heuristic
//! ```

pub mod tiers;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, DEFAULT_GEMINI_MODEL};
use crate::gateway::{GeminiAdapter, ProviderError, ProxyClient, DEFAULT_PROXY_TIMEOUT};
use crate::heuristic::heuristic_priority;
use crate::rating::{PriorityReport, PriorityResult, ResultMode};
use crate::task::Task;
use crate::tuning::TuningConfig;

pub use tiers::{GeminiTier, HeuristicTier, KeySource, ProxyTier, NO_REMOTE_AVAILABLE};

pub const EMPTY_SUMMARY: &str = "No tasks available to prioritize";
pub const EMPTY_REASON: &str = "No tasks";

// =============================================================================
// Tier contract
// =============================================================================

/// Why a tier did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{tier}: {message}")]
pub struct TierFailure {
    /// Label used in combined diagnostics, e.g. "Backend".
    pub tier: &'static str,
    pub code: &'static str,
    pub message: String,
    /// Upstream HTTP status, when there was one.
    pub http_status: Option<u16>,
    /// Provider status code and message from the upstream error body.
    pub detail: Option<String>,
    pub retryable: bool,
}

impl TierFailure {
    pub fn new(tier: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            tier,
            code,
            message: message.into(),
            http_status: None,
            detail: None,
            retryable: false,
        }
    }
}

/// A tier's result plus the diagnostic it wants attached.
#[derive(Debug, Clone)]
pub struct TierOutcome {
    pub result: PriorityResult,
    pub reason: Option<String>,
}

#[async_trait]
pub trait Tier: Send + Sync {
    fn label(&self) -> &'static str;

    fn mode(&self) -> ResultMode;

    fn provider(&self) -> &'static str;

    fn model(&self, config: &TuningConfig) -> String;

    /// Unavailable tiers are skipped without recording a failure.
    fn is_available(&self, config: &TuningConfig) -> bool;

    async fn attempt(
        &self,
        tasks: &[Task],
        config: &TuningConfig,
        prior: &[TierFailure],
    ) -> Result<TierOutcome, TierFailure>;
}

/// Combine earlier failures into one diagnostic line.
///
/// One failure yields its bare message; several are prefixed with their tier
/// labels and joined with `"; "`.
pub fn fallback_reason(prior: &[TierFailure]) -> Option<String> {
    match prior {
        [] => None,
        [only] => Some(only.message.clone()),
        many => Some(
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        ),
    }
}

// =============================================================================
// Outcome
// =============================================================================

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub mode: ResultMode,
    pub provider: String,
    pub model: String,
    pub result: PriorityResult,
    pub reason: Option<String>,
    /// Every failure recorded on the way, in tier order.
    pub failures: Vec<TierFailure>,
    pub generated_at: DateTime<Utc>,
}

impl CascadeOutcome {
    /// Whether a degraded path produced this result.
    pub fn is_fallback(&self) -> bool {
        self.mode == ResultMode::Mock || self.reason.is_some()
    }

    pub fn into_report(self) -> PriorityReport {
        let fallback = self.is_fallback();
        PriorityReport {
            result: self.result,
            mode: self.mode,
            provider: self.provider,
            model: self.model,
            fallback,
            fallback_reason: self.reason,
            generated_at: self.generated_at,
            file_path: None,
        }
    }
}

// =============================================================================
// Cascade
// =============================================================================

pub struct Cascade {
    tiers: Vec<Box<dyn Tier>>,
}

impl Cascade {
    pub fn new(tiers: Vec<Box<dyn Tier>>) -> Self {
        Self { tiers }
    }

    /// Backend, then the caller's own key if allowed, then the heuristic.
    pub fn client(base_url: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self::client_with(
            ProxyClient::new(base_url)?,
            GeminiAdapter::new(DEFAULT_PROXY_TIMEOUT)?,
        ))
    }

    pub fn client_with(proxy: ProxyClient, gemini: GeminiAdapter) -> Self {
        Self::new(vec![
            Box::new(ProxyTier::new(proxy)),
            Box::new(GeminiTier::new(
                Arc::new(gemini),
                KeySource::FromConfig,
                DEFAULT_GEMINI_MODEL,
            )),
            Box::new(HeuristicTier::new()),
        ])
    }

    /// The server's own chain: its configured key, then the heuristic.
    pub fn server(config: &ServerConfig) -> Result<Self, ProviderError> {
        let gemini = GeminiAdapter::with_config(&config.gemini_base_url, config.gemini_timeout)?;
        Ok(Self::new(vec![
            Box::new(GeminiTier::new(
                Arc::new(gemini),
                KeySource::Fixed(config.gemini_api_key.clone()),
                config.gemini_model.clone(),
            )),
            Box::new(HeuristicTier::new()),
        ]))
    }

    pub fn tier_labels(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.label()).collect()
    }

    /// Run tiers in order until one succeeds.
    ///
    /// An empty task list returns immediately without touching any tier.
    pub async fn run(&self, tasks: &[Task], config: &TuningConfig) -> CascadeOutcome {
        if tasks.is_empty() {
            debug!("no tasks; skipping all tiers");
            return CascadeOutcome {
                mode: ResultMode::Mock,
                provider: "heuristic".into(),
                model: "heuristic".into(),
                result: PriorityResult::empty(EMPTY_SUMMARY),
                reason: Some(EMPTY_REASON.into()),
                failures: Vec::new(),
                generated_at: Utc::now(),
            };
        }

        let mut failures: Vec<TierFailure> = Vec::new();

        for tier in &self.tiers {
            if !tier.is_available(config) {
                debug!(tier = tier.label(), "tier unavailable; skipping");
                continue;
            }

            match tier.attempt(tasks, config, &failures).await {
                Ok(outcome) => {
                    info!(
                        tier = tier.label(),
                        mode = tier.mode().as_str(),
                        tasks = outcome.result.rated_tasks.len(),
                        failures = failures.len(),
                        "prioritization complete"
                    );
                    return CascadeOutcome {
                        mode: tier.mode(),
                        provider: tier.provider().to_string(),
                        model: tier.model(config),
                        result: outcome.result,
                        reason: outcome.reason,
                        failures,
                        generated_at: Utc::now(),
                    };
                }
                Err(failure) => {
                    warn!(
                        tier = failure.tier,
                        code = failure.code,
                        status = failure.http_status,
                        detail = failure.detail.as_deref(),
                        retryable = failure.retryable,
                        error = %failure.message,
                        "tier failed; falling through"
                    );
                    failures.push(failure);
                }
            }
        }

        // A chain without a heuristic tier still answers.
        warn!("every tier failed; scoring heuristically");
        let reason = fallback_reason(&failures).unwrap_or_else(|| NO_REMOTE_AVAILABLE.into());
        CascadeOutcome {
            mode: ResultMode::Mock,
            provider: "heuristic".into(),
            model: "heuristic".into(),
            result: heuristic_priority(tasks, &config.tuning, Utc::now()),
            reason: Some(reason),
            failures,
            generated_at: Utc::now(),
        }
    }
}
