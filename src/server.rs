//! HTTP surface: rank tasks, read the latest snapshot, report health.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cascade::Cascade;
use crate::config::{ServerConfig, SERVICE_NAME};
use crate::rating::{PriorityReport, PriorityResult, ResultMode};
use crate::store::{SnapshotStore, StoreError};
use crate::task::normalize_tasks;
use crate::tuning::TuningConfig;

/// Request bodies larger than this are rejected with 413.
pub const MAX_BODY_BYTES: usize = 1_000_000;

pub const EMPTY_REQUEST_SUMMARY: &str = "No tasks received";

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub cascade: Arc<Cascade>,
    pub store: Arc<dyn SnapshotStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(cascade: Cascade, store: Arc<dyn SnapshotStore>, config: ServerConfig) -> Self {
        Self {
            cascade: Arc::new(cascade),
            store,
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("snapshot store failed: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Routes:
/// - POST /priority - rank tasks, persist and return the report
/// - GET /priority/latest - last persisted report
/// - GET /health - liveness plus configuration hints
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/priority", post(prioritize))
        .route("/priority/latest", get(latest))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "priority server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ============================================================================
// Handlers
// ============================================================================

/// Parse a request body. An empty body reads as `{}`.
fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))
}

fn parse_config(body: &Value) -> Result<TuningConfig, ApiError> {
    match body.get("llmConfig") {
        Some(cfg) if cfg.is_object() => serde_json::from_value(cfg.clone())
            .map_err(|e| ApiError::Validation(format!("Invalid llmConfig: {e}"))),
        _ => Ok(TuningConfig::default()),
    }
}

/// POST /priority
async fn prioritize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PriorityReport>, ApiError> {
    let body = parse_body(&body)?;
    let config = parse_config(&body)?;
    let tasks = normalize_tasks(body.get("tasks").unwrap_or(&Value::Null));

    let mut report = if tasks.is_empty() {
        PriorityReport {
            result: PriorityResult::empty(EMPTY_REQUEST_SUMMARY),
            mode: ResultMode::Mock,
            provider: "gemini".into(),
            model: config.model_or(&state.config.gemini_model).to_string(),
            fallback: true,
            fallback_reason: None,
            generated_at: Utc::now(),
            file_path: None,
        }
    } else {
        state.cascade.run(&tasks, &config).await.into_report()
    };
    report.file_path = Some(state.store.location());

    if let Err(err) = state.store.save(&report).await {
        warn!(error = %err, "failed to persist snapshot; serving result anyway");
    }

    Ok(Json(report))
}

/// GET /priority/latest
///
/// An unreadable snapshot answers like a missing one.
async fn latest(State(state): State<AppState>) -> Result<Json<PriorityReport>, ApiError> {
    let missing = || {
        ApiError::NotFound(format!(
            "No priority snapshot found at {}",
            state.store.location()
        ))
    };
    match state.store.latest().await {
        Ok(snapshot) => snapshot.map(Json).ok_or_else(missing),
        Err(StoreError::Json(err)) => {
            warn!(error = %err, "snapshot is corrupt; reporting it as missing");
            Err(missing())
        }
        Err(err) => Err(err.into()),
    }
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "hasGeminiKey": state.config.has_gemini_key(),
        "snapshotPath": state.store.location(),
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_reads_as_empty_object() {
        assert_eq!(parse_body(b"").unwrap(), json!({}));
        assert_eq!(parse_body(b" \n").unwrap(), json!({}));
        assert!(matches!(parse_body(b"{nope"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn non_object_config_is_ignored() {
        let cfg = parse_config(&json!({"llmConfig": "fast"})).unwrap();
        assert_eq!(cfg, TuningConfig::default());
    }

    #[test]
    fn error_statuses() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Store(StoreError::Poisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
