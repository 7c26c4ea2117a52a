//! Google Gemini adapter for `generateContent`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ErrorContext, ProviderError};
use super::types::{FinishReason, GenerateRequest, GenerateResponse};

// =============================================================================
// TRAIT
// =============================================================================

/// A text-generation endpoint the direct tier can call.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short lowercase provider id, e.g. "gemini".
    fn provider(&self) -> &'static str;

    /// Name used in human-readable summaries, e.g. "Gemini".
    fn display_name(&self) -> &'static str;

    async fn generate(
        &self,
        api_key: &str,
        req: &GenerateRequest,
    ) -> Result<GenerateResponse, ProviderError>;
}

// =============================================================================
// GEMINI ADAPTER
// =============================================================================

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Maximum allowed response body (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed prompt characters.
const MAX_INPUT_CHARS: usize = 500_000;

#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GeminiAdapter {
    /// Public endpoint with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_config(GEMINI_BASE_URL, timeout)
    }

    pub fn with_config(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateApiRequest<'a> {
    contents: [ApiContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    role: &'static str,
    parts: [ApiPart<'a>; 1],
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateApiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    status: Option<String>,
}

// =============================================================================
// MODEL PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ModelProvider for GeminiAdapter {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn display_name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(
        &self,
        api_key: &str,
        req: &GenerateRequest,
    ) -> Result<GenerateResponse, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::config("GEMINI_API_KEY is missing"));
        }
        let chars = req.prompt.chars().count();
        if chars > MAX_INPUT_CHARS {
            return Err(ProviderError::InvalidRequest(format!(
                "Input too large: {chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();

        let body = GenerateApiRequest {
            contents: [ApiContent {
                role: "user",
                parts: [ApiPart { text: &req.prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: req.temperature,
                response_mime_type: req.json_mode.then_some("application/json"),
            },
        };

        let mut response = self
            .client
            .post(self.generate_url(&req.model))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?
        {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::upstream(
                    "gemini",
                    format!("Gemini response too large: {new_len} bytes"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let parsed = serde_json::from_slice::<GenerateApiResponse>(&bytes);

        if !status.is_success() {
            let mut ctx = ErrorContext::new().with_status(status.as_u16());
            if let Ok(GenerateApiResponse {
                error: Some(error), ..
            }) = parsed
            {
                if let Some(code) = error.status {
                    ctx = ctx.with_code(code);
                }
                if let Some(message) = error.message {
                    debug!(status = status.as_u16(), %message, "gemini returned an error body");
                    ctx = ctx.with_detail(message);
                }
            }
            return Err(ProviderError::upstream_with_context(
                "gemini",
                format!("Gemini HTTP {}", status.as_u16()),
                ctx,
            ));
        }

        let parsed = parsed.map_err(|e| {
            ProviderError::upstream("gemini", format!("Gemini returned invalid JSON: {e}"))
        })?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::upstream(
                "gemini",
                error
                    .message
                    .unwrap_or_else(|| "Gemini API error".to_string()),
            ));
        }

        let candidate = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or(ProviderError::MissingContent { provider: "Gemini" })?;

        let finish_reason = FinishReason::from(candidate.finish_reason);
        let content = candidate
            .content
            .and_then(|c| c.parts)
            .and_then(|parts| parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::MissingContent { provider: "Gemini" })?;

        Ok(GenerateResponse {
            content,
            latency: start.elapsed(),
            finish_reason,
        })
    }
}
