// Argon - WAL-based branching, time-travel, and restore for a document store.

pub mod branch;
pub mod cancellation;
pub mod compression;
pub mod config;
pub mod error;
pub mod ids;
pub mod interceptor;
pub mod materializer;
pub mod monitoring;
pub mod project;
pub mod restore;
pub mod store;
pub mod timetravel;
pub mod wal;

pub use error::{ArgonError, Result};

use std::sync::Arc;

use branch::BranchService;
use config::ArgonConfig;
use interceptor::Interceptor;
use materializer::Materializer;
use monitoring::Monitor;
use project::ProjectService;
use restore::RestoreService;
use store::LogStore;
use timetravel::TimeTravelService;
use wal::WalService;

/// Wires every component together over a caller-supplied `LogStore`. This
/// is the type an embedding application constructs once at startup.
pub struct ArgonEngine {
    pub wal: Arc<WalService>,
    pub branches: Arc<BranchService>,
    pub projects: Arc<ProjectService>,
    pub interceptor: Arc<Interceptor>,
    pub materializer: Arc<Materializer>,
    pub time_travel: Arc<TimeTravelService>,
    pub restore: Arc<RestoreService>,
    pub monitor: Arc<Monitor>,
}

impl ArgonEngine {
    pub async fn new(store: Arc<dyn LogStore>, config: ArgonConfig) -> Result<Self> {
        store.create_indexes().await?;

        let wal = Arc::new(WalService::new(store.clone(), config.compression).await?);
        let project_registry = Arc::new(project::ProjectRegistry::new());
        let branches = Arc::new(BranchService::new(wal.clone(), project_registry.clone()));
        let projects = Arc::new(ProjectService::new(wal.clone(), branches.clone(), project_registry));
        let monitor = Arc::new(Monitor::new(
            wal.clone(),
            store,
            branches.clone(),
            projects.clone(),
            config.monitor,
        ));
        let metrics = monitor.metrics.clone();
        let interceptor = Arc::new(Interceptor::new(wal.clone(), branches.clone(), metrics.clone()));
        let materializer = Arc::new(Materializer::new(wal.clone(), metrics.clone()));
        let time_travel = Arc::new(TimeTravelService::new(wal.clone(), materializer.clone()));
        let restore = Arc::new(RestoreService::new(wal.clone(), branches.clone(), time_travel.clone(), metrics));

        Ok(Self {
            wal,
            branches,
            projects,
            interceptor,
            materializer,
            time_travel,
            restore,
            monitor,
        })
    }

    /// Starts the monitor's background health-check and metrics-report
    /// loops. Separate from `new` so callers (tests especially) can opt out
    /// of spawning background tasks entirely.
    pub fn start_monitoring(&self) {
        self.monitor.spawn_background_loops();
    }
}
