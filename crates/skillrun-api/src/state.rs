//! Application state wiring all collaborators together.
//!
//! `AppState` pins the orchestrator's generics to the concrete infra
//! implementations and owns the queue worker handle. Used by both CLI
//! commands and REST API handlers.

use std::path::PathBuf;
use std::sync::Arc;

use skillrun_core::engine::ExecutionOrchestrator;
use skillrun_infra::catalog::InMemoryCatalog;
use skillrun_infra::queue::{TokioWorkQueue, run_worker, work_queue};
use skillrun_infra::sqlite::execution::SqliteExecutionRepository;
use skillrun_infra::sqlite::pool::DatabasePool;
use skillrun_infra::workload::HttpWorkloadEngine;
use skillrun_types::config::EngineConfig;

/// The orchestrator with its generics pinned to the infra implementations.
pub type ConcreteOrchestrator = ExecutionOrchestrator<
    SqliteExecutionRepository,
    InMemoryCatalog,
    TokioWorkQueue,
    HttpWorkloadEngine,
>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub catalog: Arc<InMemoryCatalog>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: config, database, catalog, queue,
    /// workload engine client, and the background queue worker.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir)?;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("skillrun.db").display()
        );
        let pool = DatabasePool::new(&db_url).await?;
        let repo = Arc::new(SqliteExecutionRepository::new(pool));

        let catalog = Arc::new(InMemoryCatalog::new());

        let engine_url = std::env::var("SKILLRUN_ENGINE_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());
        let engine_token = std::env::var("SKILLRUN_ENGINE_TOKEN").ok();
        let workload = Arc::new(HttpWorkloadEngine::new(engine_url, engine_token));

        let (queue, rx) = work_queue();
        let concurrency = config.queue_concurrency;
        let orchestrator = Arc::new(ExecutionOrchestrator::new(
            repo,
            Arc::clone(&catalog),
            Arc::new(queue),
            workload,
            config,
        ));

        tokio::spawn(run_worker(Arc::clone(&orchestrator), rx, concurrency));

        Ok(Self {
            orchestrator,
            catalog,
            data_dir,
        })
    }
}

/// Data directory from `SKILLRUN_DATA_DIR`, defaulting to `~/.skillrun`.
pub fn resolve_data_dir() -> PathBuf {
    std::env::var("SKILLRUN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".skillrun")
        })
}

/// Load `config.toml` from the data directory; defaults when absent.
fn load_config(data_dir: &std::path::Path) -> anyhow::Result<EngineConfig> {
    let path = data_dir.join("config.toml");
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    } else {
        Ok(EngineConfig::default())
    }
}
