#![forbid(unsafe_code)]

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use priority_harness::config::SNAPSHOT_FILE;
use priority_harness::heuristic::heuristic_priority;
use priority_harness::server::{self, AppState};
use priority_harness::{
    normalize_tasks, Cascade, JsonFileStore, ServerConfig, SnapshotStore, TuningConfig,
};

#[derive(Parser)]
#[command(name = "priority", version, about = "Task prioritization harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long, env = "HOST")]
        host: Option<IpAddr>,
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// Directory holding the latest-result snapshot
        #[arg(long, env = "PRIORITY_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Rank tasks through the full client chain (backend, direct, heuristic)
    Rank {
        /// JSON array of tasks
        #[arg(long)]
        tasks: PathBuf,
        /// JSON object in `llmConfig` shape
        #[arg(long)]
        config: Option<PathBuf>,
        /// Priority backend, e.g. http://127.0.0.1:8000
        #[arg(long, env = "PRIORITY_API_BASE_URL")]
        base_url: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score tasks with the heuristic only
    Score {
        #[arg(long)]
        tasks: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the latest persisted result
    Latest {
        #[arg(long, env = "PRIORITY_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before clap reads `env` attributes.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let mut config = ServerConfig::from_env();
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if !config.has_gemini_key() {
                tracing::warn!("GEMINI_API_KEY is not set; requests will use the heuristic");
            }

            let cascade = Cascade::server(&config)?;
            let store = Arc::new(JsonFileStore::new(config.snapshot_path()));
            let addr = config.addr();
            server::serve(AppState::new(cascade, store, config), addr).await?;
        }
        Commands::Rank {
            tasks,
            config,
            base_url,
            out,
        } => {
            let tasks = normalize_tasks(&read_json::<Value>(&tasks)?);
            let config = read_config(config.as_ref())?;

            let report = Cascade::client(base_url)?
                .run(&tasks, &config)
                .await
                .into_report();

            match out {
                Some(path) => {
                    write_json(&path, &report)?;
                    eprintln!("[rank] {} result written to {}", report.mode.as_str(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            if let Some(reason) = &report.fallback_reason {
                eprintln!("[rank] fallback: {reason}");
            }
        }
        Commands::Score { tasks, config } => {
            let tasks = normalize_tasks(&read_json::<Value>(&tasks)?);
            let config = read_config(config.as_ref())?;
            let result = heuristic_priority(&tasks, &config.tuning, Utc::now());
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Latest { data_dir } => {
            let dir = data_dir.unwrap_or_else(|| ServerConfig::from_env().data_dir);
            let store = JsonFileStore::new(dir.join(SNAPSHOT_FILE));
            match store.latest().await? {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => {
                    return Err(
                        format!("No priority snapshot found at {}", store.location()).into(),
                    );
                }
            }
        }
    }

    Ok(())
}

fn read_config(path: Option<&PathBuf>) -> Result<TuningConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => read_json(path),
        None => Ok(TuningConfig::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
