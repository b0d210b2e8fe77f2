// Health checks (C10): named checks a monitor loop runs on a timer.
//
// The teacher's `HealthCheck` trait is synchronous; ours runs against an
// async `LogStore`, so `check` is `async_trait` instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::Lsn;
use crate::store::LogStore;
use crate::wal::WalService;

use super::metrics::EngineMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub check_name: String,
    pub status: HealthStatus,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl HealthCheckResult {
    pub fn new(check_name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            status,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> HealthCheckResult;
}

/// Confirms the backing `LogStore` answers a cheap read.
pub struct StoreConnectivityCheck {
    store: Arc<dyn LogStore>,
}

impl StoreConnectivityCheck {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthCheck for StoreConnectivityCheck {
    fn name(&self) -> &str {
        "store_connectivity"
    }

    async fn check(&self) -> HealthCheckResult {
        match self.store.find_max_lsn().await {
            Ok(_) => HealthCheckResult::new(self.name(), HealthStatus::Healthy, "store reachable"),
            Err(e) => HealthCheckResult::new(self.name(), HealthStatus::Critical, format!("store error: {e}")),
        }
    }
}

/// Flags sustained elevated latency against `MonitorConfig::max_latency`.
pub struct LatencyThresholdCheck {
    metrics: Arc<EngineMetrics>,
    max_latency: Duration,
}

impl LatencyThresholdCheck {
    pub fn new(metrics: Arc<EngineMetrics>, max_latency: Duration) -> Self {
        Self { metrics, max_latency }
    }
}

#[async_trait]
impl HealthCheck for LatencyThresholdCheck {
    fn name(&self) -> &str {
        "latency_thresholds"
    }

    async fn check(&self) -> HealthCheckResult {
        let avg = self.metrics.latency.average();
        let p99 = self.metrics.latency.p99();

        let (status, message) = if p99 > self.max_latency * 2 {
            (HealthStatus::Critical, format!("p99 latency {p99:?} far exceeds threshold {:?}", self.max_latency))
        } else if avg > self.max_latency {
            (HealthStatus::Warning, format!("average latency {avg:?} above threshold {:?}", self.max_latency))
        } else {
            (HealthStatus::Healthy, format!("average latency {avg:?} within threshold"))
        };

        HealthCheckResult::new(self.name(), status, message)
            .with_detail("average_latency_ms", avg.as_millis().to_string())
            .with_detail("p99_latency_ms", p99.as_millis().to_string())
    }
}

/// Flags an LSN allocator that has run unreasonably far ahead of the log's
/// physical entry count, which would indicate repeated rollback storms
/// (every failed append burns an LSN without writing an entry).
pub struct AllocatorMemoryCheck {
    wal: Arc<WalService>,
    store: Arc<dyn LogStore>,
}

impl AllocatorMemoryCheck {
    pub fn new(wal: Arc<WalService>, store: Arc<dyn LogStore>) -> Self {
        Self { wal, store }
    }
}

#[async_trait]
impl HealthCheck for AllocatorMemoryCheck {
    fn name(&self) -> &str {
        "allocator_memory"
    }

    async fn check(&self) -> HealthCheckResult {
        let allocated = self.wal.current_lsn();
        let written = self.store.find_max_lsn().await.ok().flatten().unwrap_or(Lsn::ZERO);
        let gap = (allocated.0 - written.0).max(0);

        let (status, message) = if gap > 10_000 {
            (HealthStatus::Critical, format!("allocator is {gap} LSNs ahead of the log"))
        } else if gap > 1_000 {
            (HealthStatus::Warning, format!("allocator is {gap} LSNs ahead of the log"))
        } else {
            (HealthStatus::Healthy, "allocator tracks the log closely".to_string())
        };

        HealthCheckResult::new(self.name(), status, message).with_detail("gap", gap.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionConfig;
    use crate::store::MemoryLogStore;

    #[tokio::test]
    async fn store_connectivity_check_is_healthy_for_working_store() {
        let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
        let check = StoreConnectivityCheck::new(store);
        let result = check.check().await;
        assert_eq!(result.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn allocator_memory_check_is_healthy_when_tracking_closely() {
        let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
        let wal = Arc::new(WalService::new(store.clone(), CompressionConfig::default()).await.unwrap());
        let check = AllocatorMemoryCheck::new(wal, store);
        let result = check.check().await;
        assert_eq!(result.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn latency_threshold_check_warns_above_threshold() {
        let metrics = Arc::new(EngineMetrics::default());
        for _ in 0..5 {
            metrics.record_success(Duration::from_millis(500));
        }
        let check = LatencyThresholdCheck::new(metrics, Duration::from_millis(100));
        let result = check.check().await;
        assert_eq!(result.status, HealthStatus::Warning);
    }
}
