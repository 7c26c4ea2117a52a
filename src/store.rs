//! Latest-result snapshot storage.
//!
//! One document, last write wins. The server saves every response it serves
//! and `/priority/latest` reads it back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::rating::PriorityReport;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot store lock poisoned")]
    Poisoned,
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot.
    async fn save(&self, report: &PriorityReport) -> Result<(), StoreError>;

    /// The most recent snapshot, or `None` if nothing was saved yet.
    async fn latest(&self) -> Result<Option<PriorityReport>, StoreError>;

    /// Where snapshots live, for health output.
    fn location(&self) -> String;
}

// =============================================================================
// File store
// =============================================================================

/// Distinguishes temp files of overlapping saves within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Pretty-printed JSON file, replaced atomically via a sibling temp file.
/// Every save gets its own temp name, so concurrent saves never share one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn save(&self, report: &PriorityReport) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(dir, e))?;
        }

        let json = serde_json::to_vec_pretty(report)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(&self.path, e));
        }

        debug!(path = %self.path.display(), bytes = json.len(), "snapshot written");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<PriorityReport>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    latest: Mutex<Option<PriorityReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, report: &PriorityReport) -> Result<(), StoreError> {
        let mut slot = self.latest.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(report.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<PriorityReport>, StoreError> {
        let slot = self.latest.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(slot.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
