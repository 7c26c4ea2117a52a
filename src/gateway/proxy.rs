//! Client for a remote priority backend that speaks our own `/priority` API.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::{ErrorContext, ProviderError};
use crate::rating::PriorityResult;
use crate::response::reconcile;
use crate::task::Task;
use crate::tuning::{BackendConfig, TuningConfig};

pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(8);

/// Maximum allowed response body (2MB).
const MAX_RESPONSE_LEN: usize = 2 * 1_024 * 1_024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest<'a> {
    tasks: &'a [Task],
    llm_config: BackendConfig<'a>,
}

#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl ProxyClient {
    pub fn new(base_url: Option<String>) -> Result<Self, ProviderError> {
        Self::with_config(base_url, DEFAULT_PROXY_TIMEOUT)
    }

    pub fn with_config(base_url: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Ask the backend to rank `tasks`. The caller's API key is never sent.
    pub async fn prioritize(
        &self,
        tasks: &[Task],
        config: &TuningConfig,
    ) -> Result<PriorityResult, ProviderError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ProviderError::config("No API base URL configured"))?;

        let body = ProxyRequest {
            tasks,
            llm_config: config.for_backend(),
        };

        let mut response = self
            .client
            .post(format!("{base}/priority"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::upstream_with_context(
                "backend",
                format!("HTTP {}", status.as_u16()),
                ErrorContext::new().with_status(status.as_u16()),
            ));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?
        {
            if bytes.len() + chunk.len() > MAX_RESPONSE_LEN {
                return Err(ProviderError::upstream(
                    "backend",
                    "Backend response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        // Backends serialize loosely (fractional scores, null weights), so the
        // body goes through the same reconciliation as model output.
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::upstream("backend", format!("Backend returned invalid JSON: {e}"))
        })?;
        let result = reconcile(&value, tasks, "Backend");
        debug!(tasks = result.rated_tasks.len(), "backend answered");

        Ok(result)
    }
}
