//! The three built-in tiers: remote backend, direct model call, heuristic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{fallback_reason, Tier, TierFailure, TierOutcome};
use crate::config::DEFAULT_GEMINI_MODEL;
use crate::gateway::{GenerateRequest, ModelProvider, ProviderError, ProxyClient};
use crate::heuristic::heuristic_priority;
use crate::prompts::{build_prompt, DEFAULT_PROMPT};
use crate::rating::ResultMode;
use crate::response::parse_model_output;
use crate::task::Task;
use crate::tuning::TuningConfig;

/// Reason given by the heuristic tier when nothing was tried before it.
pub const NO_REMOTE_AVAILABLE: &str = "No backend/direct model API available";

impl TierFailure {
    fn from_provider(tier: &'static str, err: ProviderError) -> Self {
        let detail = err.context().and_then(|ctx| {
            match (ctx.provider_code.as_deref(), ctx.detail.as_deref()) {
                (Some(code), Some(detail)) => Some(format!("{code}: {detail}")),
                (code, detail) => code.or(detail).map(str::to_string),
            }
        });
        Self {
            http_status: err.http_status(),
            detail,
            retryable: err.is_retryable(),
            ..Self::new(tier, err.code(), err.to_string())
        }
    }
}

// =============================================================================
// Remote backend
// =============================================================================

pub struct ProxyTier {
    client: ProxyClient,
}

impl ProxyTier {
    pub const LABEL: &'static str = "Backend";

    pub fn new(client: ProxyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tier for ProxyTier {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    fn mode(&self) -> ResultMode {
        ResultMode::Live
    }

    fn provider(&self) -> &'static str {
        "backend"
    }

    fn model(&self, config: &TuningConfig) -> String {
        config.model_or(DEFAULT_GEMINI_MODEL).to_string()
    }

    /// Always tried; a missing base URL is reported as a failure.
    fn is_available(&self, _config: &TuningConfig) -> bool {
        true
    }

    async fn attempt(
        &self,
        tasks: &[Task],
        config: &TuningConfig,
        _prior: &[TierFailure],
    ) -> Result<TierOutcome, TierFailure> {
        let result = self
            .client
            .prioritize(tasks, config)
            .await
            .map_err(|e| TierFailure::from_provider(Self::LABEL, e))?;
        Ok(TierOutcome {
            result,
            reason: None,
        })
    }
}

// =============================================================================
// Direct model call
// =============================================================================

/// Where the direct tier gets its credential.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Server-held key. The tier is always tried; `None` fails fast.
    Fixed(Option<String>),
    /// Caller-supplied key, gated on `allowDirectApi`.
    FromConfig,
}

pub struct GeminiTier {
    provider: Arc<dyn ModelProvider>,
    keys: KeySource,
    default_model: String,
}

impl GeminiTier {
    pub const LABEL: &'static str = "Direct API";

    pub fn new(
        provider: Arc<dyn ModelProvider>,
        keys: KeySource,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            keys,
            default_model: default_model.into(),
        }
    }

    fn api_key<'a>(&'a self, config: &'a TuningConfig) -> Option<&'a str> {
        match &self.keys {
            KeySource::Fixed(key) => key.as_deref().map(str::trim).filter(|k| !k.is_empty()),
            KeySource::FromConfig => config.direct_api_key(),
        }
    }
}

#[async_trait]
impl Tier for GeminiTier {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    fn mode(&self) -> ResultMode {
        ResultMode::Direct
    }

    fn provider(&self) -> &'static str {
        self.provider.provider()
    }

    fn model(&self, config: &TuningConfig) -> String {
        config.model_or(&self.default_model).to_string()
    }

    fn is_available(&self, config: &TuningConfig) -> bool {
        match self.keys {
            KeySource::Fixed(_) => true,
            KeySource::FromConfig => config.direct_api_key().is_some(),
        }
    }

    async fn attempt(
        &self,
        tasks: &[Task],
        config: &TuningConfig,
        prior: &[TierFailure],
    ) -> Result<TierOutcome, TierFailure> {
        let key = self.api_key(config).ok_or_else(|| {
            TierFailure::from_provider(
                Self::LABEL,
                ProviderError::config("GEMINI_API_KEY is missing"),
            )
        })?;

        let req = GenerateRequest::new(self.model(config), build_prompt(tasks, config))
            .temperature(config.temperature() as f32);
        debug!(
            model = %req.model,
            prompt = DEFAULT_PROMPT.slug,
            chars = req.prompt.chars().count(),
            "calling model directly"
        );

        let response = self
            .provider
            .generate(key, &req)
            .await
            .map_err(|e| TierFailure::from_provider(Self::LABEL, e))?;

        debug!(
            latency_ms = response.latency.as_millis() as u64,
            finish_reason = ?response.finish_reason,
            "model answered"
        );

        let result = parse_model_output(&response.content, tasks, self.provider.display_name())
            .map_err(|e| TierFailure::new(Self::LABEL, e.code(), e.to_string()))?;

        Ok(TierOutcome {
            result,
            reason: fallback_reason(prior),
        })
    }
}

// =============================================================================
// Heuristic
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct HeuristicTier {
    /// Pinned clock, for reproducible runs.
    now: Option<DateTime<Utc>>,
}

impl HeuristicTier {
    pub const LABEL: &'static str = "Heuristic";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }
}

#[async_trait]
impl Tier for HeuristicTier {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    fn mode(&self) -> ResultMode {
        ResultMode::Mock
    }

    fn provider(&self) -> &'static str {
        "heuristic"
    }

    fn model(&self, _config: &TuningConfig) -> String {
        "heuristic".to_string()
    }

    fn is_available(&self, _config: &TuningConfig) -> bool {
        true
    }

    async fn attempt(
        &self,
        tasks: &[Task],
        config: &TuningConfig,
        prior: &[TierFailure],
    ) -> Result<TierOutcome, TierFailure> {
        let now = self.now.unwrap_or_else(Utc::now);
        Ok(TierOutcome {
            result: heuristic_priority(tasks, &config.tuning, now),
            reason: Some(fallback_reason(prior).unwrap_or_else(|| NO_REMOTE_AVAILABLE.into())),
        })
    }
}
