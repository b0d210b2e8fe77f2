// Configuration surface (spec §6). No env-var parsing lives here —
// operational packaging is an external collaborator's concern; these
// structs are meant to be constructed by the embedding application (or
// deserialized from whatever config format it already uses, hence the
// `serde` derives).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::compression::CompressionAlgorithm;

/// Record-level compression policy (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub algorithm: CompressionAlgorithm,
    /// Payloads smaller than this are stored uncompressed.
    pub min_size: usize,
    /// Algorithm-specific level (e.g. zstd level). Ignored by `None`.
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Zstd,
            min_size: 1024,
            level: 3,
        }
    }
}

/// Monitor thresholds and loop intervals (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub health_check_interval: Duration,
    pub metrics_report_interval: Duration,
    pub max_latency: Duration,
    pub max_error_rate: f64,
    pub min_success_rate: f64,
    pub max_consecutive_failures: u32,
    pub enable_logging: bool,
    pub enable_metrics_export: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            metrics_report_interval: Duration::from_secs(60),
            max_latency: Duration::from_millis(500),
            max_error_rate: 0.05,
            min_success_rate: 0.95,
            max_consecutive_failures: 3,
            enable_logging: true,
            enable_metrics_export: false,
        }
    }
}

/// Feature flags gating WAL adoption (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Master switch for the whole WAL subsystem.
    pub enable_wal: bool,
    pub wal_for_new_projects: bool,
    pub wal_for_new_branches: bool,
    pub wal_migration_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_wal: true,
            wal_for_new_projects: true,
            wal_for_new_branches: true,
            wal_migration_enabled: false,
        }
    }
}

/// Top-level configuration bundle handed to `ArgonEngine::new`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgonConfig {
    pub compression: CompressionConfig,
    pub monitor: MonitorConfig,
    pub features: FeatureFlags,
}
