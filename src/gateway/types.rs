//! Request/response types for the model gateway.

use std::time::Duration;

// =============================================================================
// GENERATION TYPES
// =============================================================================

/// One-shot text generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model id as the provider names it, e.g. "gemini-1.5-pro".
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    /// Ask the provider for a JSON response body.
    pub json_mode: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.2,
            json_mode: true,
        }
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp.clamp(0.0, 1.0);
        self
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::MaxTokens,
            Some("SAFETY") => FinishReason::Safety,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// Generated text plus call metadata.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub latency: Duration,
    pub finish_reason: FinishReason,
}
