// Alert lifecycle (C10): threshold-triggered alerts with resolution.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Error => write!(f, "ERROR"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Keeps one alert per distinct `title` active at a time; re-triggering an
/// already-active alert is a no-op rather than a duplicate entry.
#[derive(Debug, Default)]
pub struct AlertManager {
    alerts: RwLock<Vec<Alert>>,
}

impl AlertManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, title: &str, severity: AlertSeverity, message: impl Into<String>) {
        let mut alerts = self.alerts.write();
        if alerts.iter().any(|a| a.title == title && a.is_active()) {
            return;
        }
        alerts.push(Alert {
            title: title.to_string(),
            severity,
            message: message.into(),
            triggered_at: Utc::now(),
            resolved_at: None,
        });
    }

    /// Marks the most recent active alert with `title` resolved. A no-op if
    /// no such alert exists.
    pub fn resolve(&self, title: &str) {
        let mut alerts = self.alerts.write();
        if let Some(alert) = alerts
            .iter_mut()
            .rev()
            .find(|a| a.title == title && a.is_active())
        {
            alert.resolved_at = Some(Utc::now());
        }
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }
}
