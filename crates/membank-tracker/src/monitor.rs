//! Response-time monitoring with threshold alerts.
//!
//! Targets are checked after the fact: a slow or failing operation is
//! recorded and may raise an alert, it is never interrupted.

use crate::json_log::CappedLog;
use chrono::Utc;
use membank_types::config::MonitoringConfig;
use membank_types::error::{MembankError, MembankResult};
use membank_types::monitoring::{
    Alert, AlertLevel, DashboardSnapshot, HealthStatus, MetricSample, OperationStats,
    PerformanceSummary,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Most recent samples of one operation considered for its error rate.
const ERROR_WINDOW: usize = 20;

/// Fewer samples than this never raise an error-rate alert.
const MIN_ERROR_SAMPLES: usize = 5;

/// Alerts shown on the dashboard.
const DASHBOARD_ALERTS: usize = 10;

/// Performance monitor over `metrics.json` and `alerts.json`.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    metrics: CappedLog,
    alerts: CappedLog,
    target_ms: u64,
    error_rate_threshold: f64,
}

impl PerformanceMonitor {
    pub fn new(dir: &Path, config: &MonitoringConfig) -> Self {
        Self {
            metrics: CappedLog::new(dir.join("metrics.json"), config.max_samples),
            alerts: CappedLog::new(dir.join("alerts.json"), config.max_alerts),
            target_ms: config.response_time_target_ms,
            error_rate_threshold: config.error_rate_threshold,
        }
    }

    /// Record one operation. Returns the alerts it raised.
    pub fn record(&self, operation: &str, duration_ms: u64, success: bool) -> MembankResult<Vec<Alert>> {
        let now = Utc::now();
        let mut samples: Vec<MetricSample> = self.metrics.load();
        samples.push(MetricSample {
            timestamp: now,
            operation: operation.to_string(),
            duration_ms,
            success,
        });
        self.metrics.save(&samples)?;
        debug!(operation, duration_ms, success, "Metric recorded");

        let mut raised = Vec::new();
        if duration_ms > self.target_ms {
            warn!(
                operation,
                elapsed_ms = duration_ms,
                target_ms = self.target_ms,
                "Operation exceeded response time target"
            );
            raised.push(new_alert(
                AlertLevel::Warning,
                operation,
                format!(
                    "{operation} took {duration_ms} ms (target {} ms)",
                    self.target_ms
                ),
            ));
        }

        let window: Vec<&MetricSample> = samples
            .iter()
            .rev()
            .filter(|s| s.operation == operation)
            .take(ERROR_WINDOW)
            .collect();
        if !success && window.len() >= MIN_ERROR_SAMPLES {
            let failures = window.iter().filter(|s| !s.success).count();
            let rate = failures as f64 / window.len() as f64;
            if rate > self.error_rate_threshold {
                warn!(
                    operation,
                    error_rate = rate,
                    threshold = self.error_rate_threshold,
                    "Error rate above threshold"
                );
                raised.push(new_alert(
                    AlertLevel::Critical,
                    operation,
                    format!(
                        "error rate {:.1}% over the last {} {operation} calls (threshold {:.1}%)",
                        rate * 100.0,
                        window.len(),
                        self.error_rate_threshold * 100.0
                    ),
                ));
            }
        }

        if !raised.is_empty() {
            let mut alerts: Vec<Alert> = self.alerts.load();
            alerts.extend(raised.iter().cloned());
            self.alerts.save(&alerts)?;
        }
        Ok(raised)
    }

    /// Run `f`, time it and record the outcome. The closure's result is
    /// returned unchanged; a failure to record is only logged.
    pub fn time<T, F>(&self, operation: &str, f: F) -> MembankResult<T>
    where
        F: FnOnce() -> MembankResult<T>,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed().as_millis() as u64;
        if let Err(e) = self.record(operation, elapsed, result.is_ok()) {
            warn!(operation, error = %e, "Failed to record metric");
        }
        result
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.metrics.load()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.load()
    }

    /// The newest `n` alerts, newest first.
    pub fn recent_alerts(&self, n: usize) -> Vec<Alert> {
        self.alerts().into_iter().rev().take(n).collect()
    }

    pub fn acknowledge_alert(&self, id: &str) -> MembankResult<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.load();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| MembankError::NotFound(format!("alert '{id}'")))?;
        alert.acknowledged = true;
        let acknowledged = alert.clone();
        self.alerts.save(&alerts)?;
        Ok(acknowledged)
    }

    pub fn summary(&self) -> PerformanceSummary {
        summarize(&self.samples())
    }

    pub fn dashboard(&self) -> DashboardSnapshot {
        let summary = self.summary();
        let recent_alerts = self.recent_alerts(DASHBOARD_ALERTS);
        let open = |level: AlertLevel| {
            recent_alerts
                .iter()
                .any(|a| a.level == level && !a.acknowledged)
        };
        let health = if open(AlertLevel::Critical) || summary.error_rate > self.error_rate_threshold {
            HealthStatus::Critical
        } else if open(AlertLevel::Warning) || summary.p95_ms > self.target_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        DashboardSnapshot {
            generated_at: Utc::now(),
            health,
            summary,
            recent_alerts,
        }
    }
}

fn new_alert(level: AlertLevel, operation: &str, message: String) -> Alert {
    Alert {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        level,
        operation: operation.to_string(),
        message,
        acknowledged: false,
    }
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100);
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn stats(samples: &[&MetricSample]) -> OperationStats {
    if samples.is_empty() {
        return OperationStats::default();
    }
    let total: u64 = samples.iter().map(|s| s.duration_ms).sum();
    let failures = samples.iter().filter(|s| !s.success).count();
    OperationStats {
        count: samples.len(),
        average_ms: total as f64 / samples.len() as f64,
        max_ms: samples.iter().map(|s| s.duration_ms).max().unwrap_or(0),
        error_rate: failures as f64 / samples.len() as f64,
    }
}

/// Aggregate samples into overall and per-operation figures.
pub fn summarize(samples: &[MetricSample]) -> PerformanceSummary {
    let all: Vec<&MetricSample> = samples.iter().collect();
    let overall = stats(&all);
    let mut durations: Vec<u64> = samples.iter().map(|s| s.duration_ms).collect();
    durations.sort_unstable();

    let mut by_operation: BTreeMap<&str, Vec<&MetricSample>> = BTreeMap::new();
    for sample in samples {
        by_operation
            .entry(sample.operation.as_str())
            .or_default()
            .push(sample);
    }

    PerformanceSummary {
        samples: overall.count,
        average_ms: overall.average_ms,
        p95_ms: percentile(&durations, 95),
        max_ms: overall.max_ms,
        error_rate: overall.error_rate,
        operations: by_operation
            .into_iter()
            .map(|(op, samples)| (op.to_string(), stats(&samples)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(dir: &Path) -> PerformanceMonitor {
        let config = MonitoringConfig {
            response_time_target_ms: 100,
            error_rate_threshold: 0.2,
            ..Default::default()
        };
        PerformanceMonitor::new(dir, &config)
    }

    #[test]
    fn test_slow_operation_raises_warning() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path());
        assert!(monitor.record("consult", 50, true).unwrap().is_empty());
        let alerts = monitor.record("consult", 250, true).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert_eq!(monitor.alerts().len(), 1);
        assert_eq!(monitor.samples().len(), 2);
    }

    #[test]
    fn test_error_rate_raises_critical() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path());
        for _ in 0..4 {
            monitor.record("search", 10, true).unwrap();
        }
        let alerts = monitor.record("search", 10, false).unwrap();
        assert!(alerts.is_empty(), "1 of 5 is not above 20%");
        let alerts = monitor.record("search", 10, false).unwrap();
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(monitor.dashboard().health, HealthStatus::Critical);
    }

    #[test]
    fn test_error_rate_is_per_operation() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path());
        for _ in 0..5 {
            monitor.record("search", 10, false).unwrap();
        }
        let alerts = monitor.record("consult", 10, false).unwrap();
        assert!(alerts.is_empty(), "consult has a single sample");

        // Busy successes elsewhere do not dilute a failing operation.
        for _ in 0..30 {
            monitor.record("consult", 10, true).unwrap();
        }
        let alerts = monitor.record("search", 10, false).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].operation, "search");
        assert!(monitor
            .alerts()
            .iter()
            .all(|a| a.operation == "search"));
    }

    #[test]
    fn test_summary_and_percentile() {
        let samples: Vec<MetricSample> = (1..=20)
            .map(|i| MetricSample {
                timestamp: Utc::now(),
                operation: if i % 2 == 0 { "a" } else { "b" }.to_string(),
                duration_ms: i * 10,
                success: i != 20,
            })
            .collect();
        let summary = summarize(&samples);
        assert_eq!(summary.samples, 20);
        assert_eq!(summary.p95_ms, 190);
        assert_eq!(summary.max_ms, 200);
        assert!((summary.average_ms - 105.0).abs() < 1e-9);
        assert!((summary.error_rate - 0.05).abs() < 1e-9);
        assert_eq!(summary.operations["a"].count, 10);
        assert!((summary.operations["a"].error_rate - 0.1).abs() < 1e-9);
        assert_eq!(summarize(&[]).p95_ms, 0);
    }

    #[test]
    fn test_acknowledge_alert() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path());
        monitor.record("consult", 10, true).unwrap();
        let alert = monitor.record("consult", 150, true).unwrap().remove(0);
        assert_eq!(monitor.dashboard().health, HealthStatus::Degraded);
        monitor.acknowledge_alert(&alert.id).unwrap();
        assert!(monitor.alerts()[0].acknowledged);
        assert!(monitor.acknowledge_alert("missing").is_err());
    }

    #[test]
    fn test_time_records_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(dir.path());
        let value = monitor.time("ok", || Ok(7)).unwrap();
        assert_eq!(value, 7);
        let failed: MembankResult<()> =
            monitor.time("fail", || Err(MembankError::Internal("boom".to_string())));
        assert!(failed.is_err());
        let samples = monitor.samples();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].success);
        assert!(!samples[1].success);
    }
}
