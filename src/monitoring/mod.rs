// Metrics & Monitor (C10): engine-wide counters, alerting, and periodic
// health checks running as background tasks.

pub mod alerts;
pub mod health;
pub mod metrics;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::branch::BranchService;
use crate::config::MonitorConfig;
use crate::project::ProjectService;
use crate::store::LogStore;
use crate::wal::WalService;

pub use alerts::{Alert, AlertManager, AlertSeverity};
pub use health::{HealthCheck, HealthCheckResult, HealthStatus};
pub use metrics::EngineMetrics;

/// Aggregate of every named health check's result (spec §4.10).
pub fn overall_status(results: &[HealthCheckResult]) -> HealthStatus {
    if results.iter().any(|r| r.status == HealthStatus::Critical) {
        HealthStatus::Critical
    } else if results.iter().any(|r| r.status == HealthStatus::Warning) {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Owns the metrics/alert state and spawns the two background loops
/// (health check, metrics report). Dropping the returned `Monitor` signals
/// both loops to stop via a `watch` channel rather than aborting the tasks
/// mid-iteration.
pub struct Monitor {
    pub metrics: Arc<EngineMetrics>,
    pub alerts: Arc<AlertManager>,
    checks: Vec<Arc<dyn HealthCheck>>,
    config: MonitorConfig,
    shutdown: watch::Sender<bool>,
    wal: Arc<WalService>,
    branches: Arc<BranchService>,
    projects: Arc<ProjectService>,
    /// Consecutive health-check rounds (spec §4.10) that came back `Critical`
    /// on at least one check; reset to 0 the moment a round is clean.
    consecutive_failures: AtomicU32,
}

impl Monitor {
    pub fn new(
        wal: Arc<WalService>,
        store: Arc<dyn LogStore>,
        branches: Arc<BranchService>,
        projects: Arc<ProjectService>,
        config: MonitorConfig,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::default());
        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(health::StoreConnectivityCheck::new(store.clone())),
            Arc::new(health::LatencyThresholdCheck::new(metrics.clone(), config.max_latency)),
            Arc::new(health::AllocatorMemoryCheck::new(wal.clone(), store)),
        ];
        let (shutdown, _) = watch::channel(false);

        Self {
            metrics,
            alerts: Arc::new(AlertManager::new()),
            checks,
            config,
            shutdown,
            wal,
            branches,
            projects,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Refreshes the current-LSN/active-branch/active-project gauges from
    /// live state. Called by the metrics-report loop; exposed so a caller
    /// can also snapshot gauges outside the loop's interval.
    pub fn refresh_gauges(&self) {
        self.metrics.current_lsn.set(self.wal.current_lsn().0);
        self.metrics.active_branches.set(self.branches.active_branch_count() as i64);
        self.metrics.active_projects.set(self.projects.project_count() as i64);
    }

    pub async fn run_health_checks(&self) -> Vec<HealthCheckResult> {
        let mut results = Vec::with_capacity(self.checks.len());
        let mut any_critical = false;
        for check in &self.checks {
            let result = check.check().await;
            match result.status {
                HealthStatus::Critical => {
                    any_critical = true;
                    self.alerts.trigger(
                        &format!("health:{}", result.check_name),
                        AlertSeverity::Critical,
                        result.message.clone(),
                    )
                }
                HealthStatus::Warning => self.alerts.trigger(
                    &format!("health:{}", result.check_name),
                    AlertSeverity::Warning,
                    result.message.clone(),
                ),
                HealthStatus::Healthy => self.alerts.resolve(&format!("health:{}", result.check_name)),
            }
            results.push(result);
        }

        // §4.10: a single critical check is its own alert; `MaxConsecutiveFailures`
        // rounds of at least one critical check in a row additionally escalate to
        // a standalone `system_unhealthy` alert.
        if any_critical {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            if failures >= self.config.max_consecutive_failures {
                self.alerts.trigger(
                    "system_unhealthy",
                    AlertSeverity::Critical,
                    format!("{failures} consecutive rounds with a critical health check"),
                );
            }
        } else {
            self.consecutive_failures.store(0, Ordering::SeqCst);
            self.alerts.resolve("system_unhealthy");
        }

        if self.metrics.error_rate() > self.config.max_error_rate {
            self.alerts.trigger(
                "error_rate",
                AlertSeverity::Warning,
                format!("error rate {:.2}% above threshold", self.metrics.error_rate() * 100.0),
            );
        } else {
            self.alerts.resolve("error_rate");
        }

        if self.metrics.success_rate() < self.config.min_success_rate {
            self.alerts.trigger(
                "success_rate",
                AlertSeverity::Warning,
                format!("success rate {:.2}% below threshold", self.metrics.success_rate() * 100.0),
            );
        } else {
            self.alerts.resolve("success_rate");
        }

        results
    }

    /// Emits a structured metrics snapshot as a trace event when
    /// `enable_metrics_export` is on. Stands in for a real exporter push
    /// (Prometheus, statsd, ...); wiring one in is the embedding
    /// application's concern, not this crate's.
    fn export_metrics(&self) {
        if !self.config.enable_metrics_export {
            return;
        }
        debug!(
            operations_total = self.metrics.operations_total.get(),
            operations_failed = self.metrics.operations_failed.get(),
            success_rate = self.metrics.success_rate(),
            current_lsn = self.metrics.current_lsn.get(),
            active_branches = self.metrics.active_branches.get(),
            active_projects = self.metrics.active_projects.get(),
            "metrics export"
        );
    }

    /// Spawns the health-check loop and the metrics-report loop. Both stop
    /// when the `Monitor` is dropped.
    pub fn spawn_background_loops(self: &Arc<Self>) {
        self.spawn_health_check_loop();
        self.spawn_metrics_report_loop();
    }

    fn spawn_health_check_loop(self: &Arc<Self>) {
        let this = self.clone();
        let mut shutdown = this.shutdown.subscribe();
        let interval = this.config.health_check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let results = this.run_health_checks().await;
                        let status = overall_status(&results);
                        if this.config.enable_logging && status != HealthStatus::Healthy {
                            warn!(?status, "health check reported a non-healthy status");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    fn spawn_metrics_report_loop(self: &Arc<Self>) {
        let this = self.clone();
        let mut shutdown = this.shutdown.subscribe();
        let interval = this.config.metrics_report_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.refresh_gauges();
                        this.export_metrics();
                        if this.config.enable_logging {
                            info!(
                                success_rate = this.metrics.success_rate(),
                                avg_latency_ms = this.metrics.latency.average().as_millis() as u64,
                                operations_total = this.metrics.operations_total.get(),
                                current_lsn = this.metrics.current_lsn.get(),
                                active_branches = this.metrics.active_branches.get(),
                                active_projects = this.metrics.active_projects.get(),
                                "metrics report"
                            );
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
