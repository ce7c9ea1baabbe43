//! Performance samples, alerts and dashboard snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One timed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Warning => f.write_str("warning"),
            AlertLevel::Critical => f.write_str("critical"),
        }
    }
}

/// An alert raised by the performance monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub operation: String,
    pub message: String,
    #[serde(default)]
    pub acknowledged: bool,
}

/// Aggregates for one operation name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: usize,
    pub average_ms: f64,
    pub max_ms: u64,
    pub error_rate: f64,
}

/// Aggregates over all stored samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub samples: usize,
    pub average_ms: f64,
    pub p95_ms: u64,
    pub max_ms: u64,
    pub error_rate: f64,
    pub operations: BTreeMap<String, OperationStats>,
}

/// Overall health derived from the summary and unacknowledged alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::Degraded => f.write_str("degraded"),
            HealthStatus::Critical => f.write_str("critical"),
        }
    }
}

/// What the dashboard endpoint and `monitor dashboard` render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub health: HealthStatus,
    pub summary: PerformanceSummary,
    pub recent_alerts: Vec<Alert>,
}
