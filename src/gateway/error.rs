//! Error types for the upstream gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from upstream errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the upstream.
    pub http_status: Option<u16>,
    /// Provider-specific error status (e.g. "RESOURCE_EXHAUSTED").
    pub provider_code: Option<String>,
    /// Human-readable detail from the upstream error body.
    pub detail: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Errors from the priority backend or the model endpoint.
///
/// Display strings double as fallback diagnostics, so they stay short.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream answered with a failure status or an unusable body.
    #[error("{message}")]
    Upstream {
        provider: &'static str,
        message: String,
        context: Option<ErrorContext>,
    },

    /// Upstream answered but carried no generated text.
    #[error("{provider} response missing content")]
    MissingContent { provider: &'static str },

    /// Request exceeded its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid request - rejected before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error (missing key, no base URL, etc.).
    #[error("{0}")]
    Config(String),
}

impl ProviderError {
    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
            context: None,
        }
    }

    pub fn upstream_with_context(
        provider: &'static str,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a reqwest failure, classifying client-side timeouts.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Http(err)
        }
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "upstream_error",
            Self::MissingContent { .. } => "missing_content",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config_error",
        }
    }

    /// Whether a later attempt could succeed. The cascade makes a single pass;
    /// this is recorded on the tier failure and logged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Http(_) => true,
            Self::Upstream { context, .. } => context
                .as_ref()
                .and_then(|c| c.http_status)
                .is_some_and(|s| s == 429 || s >= 500),
            Self::MissingContent { .. } | Self::InvalidRequest(_) | Self::Config(_) => false,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Upstream { context, .. } => context.as_ref(),
            _ => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        self.context().and_then(|c| c.http_status)
    }
}
