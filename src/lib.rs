#![forbid(unsafe_code)]

//! # priority-harness
//!
//! Rank coursework and career tasks by urgency.
//!
//! A ranking is asked of a remote priority backend first, then (if the caller
//! allows it and brings a key) of Gemini directly, and finally of a
//! deterministic heuristic that blends deadline urgency, module weight and
//! effort. Whatever tier answers, the output has the same shape: tasks sorted
//! by a 0-100 score with a band and a reason, plus provenance saying which
//! tier produced it and why the earlier ones didn't.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use priority_harness::{normalize_tasks, Cascade, TuningConfig};
//!
//! let tasks = normalize_tasks(&serde_json::json!([
//!     {"title": "Essay", "dueAt": "2026-03-01", "moduleWeightPercent": 40}
//! ]));
//! let cascade = Cascade::client(Some("http://127.0.0.1:8000".into()))?;
//! let report = cascade.run(&tasks, &TuningConfig::default()).await.into_report();
//! println!("{} via {}", report.result.summary, report.mode.as_str());
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod config;
pub mod gateway;
pub mod heuristic;
pub mod prompts;
pub mod rating;
pub mod response;
pub mod server;
pub mod store;
pub mod task;
pub mod tuning;

pub use cascade::{Cascade, CascadeOutcome, Tier, TierFailure};
pub use config::ServerConfig;
pub use gateway::{GeminiAdapter, ModelProvider, ProviderError, ProxyClient};
pub use heuristic::heuristic_priority;
pub use rating::{PriorityBand, PriorityReport, PriorityResult, RatedTask, ResultMode};
pub use store::{JsonFileStore, MemoryStore, SnapshotStore};
pub use task::{normalize_tasks, Task};
pub use tuning::{PriorityWeights, TuningConfig};
