//! HTTP adapters for the two remote tiers: a priority backend and the
//! Gemini `generateContent` endpoint.

pub mod error;
pub mod gemini;
pub mod proxy;
pub mod types;

pub use error::{ErrorContext, ProviderError};
pub use gemini::{GeminiAdapter, ModelProvider, GEMINI_BASE_URL};
pub use proxy::{ProxyClient, DEFAULT_PROXY_TIMEOUT};
pub use types::*;
