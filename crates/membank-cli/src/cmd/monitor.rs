//! `membank monitor ...`

use crate::cli::MonitorCommands;
use crate::table::Table;
use crate::ui;
use membank_kernel::Membank;
use membank_types::error::MembankResult;
use membank_types::monitoring::{Alert, PerformanceSummary};

/// Alerts shown under the dashboard summary.
const DASHBOARD_ALERTS: usize = 5;

pub fn run(membank: &Membank, command: MonitorCommands) -> MembankResult<()> {
    let monitor = membank.monitor();
    match command {
        MonitorCommands::Status { json } => {
            let summary = monitor.summary();
            if json {
                ui::print_json(&summary);
            } else {
                print_summary(&summary, membank.config().monitoring.response_time_target_ms);
            }
        }
        MonitorCommands::Record {
            operation,
            duration_ms,
            failed,
        } => {
            let alerts = monitor.record(&operation, duration_ms, !failed)?;
            ui::success(&format!("Recorded {operation} ({duration_ms} ms)"));
            for alert in &alerts {
                ui::warn(&alert.message);
            }
        }
        MonitorCommands::Alerts { limit, json } => {
            let alerts = monitor.recent_alerts(limit);
            if json {
                ui::print_json(&alerts);
            } else {
                print_alerts(&alerts);
            }
        }
        MonitorCommands::Ack { id } => {
            let alert = monitor.acknowledge_alert(&id)?;
            ui::success(&format!("Acknowledged {}", alert.id));
        }
        MonitorCommands::Dashboard { json } => {
            let dashboard = monitor.dashboard();
            if json {
                ui::print_json(&dashboard);
                return Ok(());
            }
            ui::kv("Health", &ui::health(dashboard.health));
            ui::blank();
            print_summary(
                &dashboard.summary,
                membank.config().monitoring.response_time_target_ms,
            );
            if !dashboard.recent_alerts.is_empty() {
                ui::blank();
                ui::section("Recent alerts");
                let shown: Vec<Alert> = dashboard
                    .recent_alerts
                    .into_iter()
                    .take(DASHBOARD_ALERTS)
                    .collect();
                print_alerts(&shown);
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &PerformanceSummary, target_ms: u64) {
    ui::section("Performance");
    if summary.samples == 0 {
        ui::hint("No samples recorded yet");
        return;
    }
    ui::kv("Samples", &summary.samples.to_string());
    ui::kv("Average", &format!("{:.0} ms", summary.average_ms));
    let p95 = format!("{} ms (target {target_ms} ms)", summary.p95_ms);
    if summary.p95_ms > target_ms {
        ui::kv_warn("p95", &p95);
    } else {
        ui::kv_ok("p95", &p95);
    }
    ui::kv("Max", &format!("{} ms", summary.max_ms));
    ui::kv("Error rate", &format!("{:.1}%", summary.error_rate * 100.0));

    let mut table = Table::new(&["Operation", "Count", "Avg ms", "Max ms", "Errors"])
        .right(1)
        .right(2)
        .right(3)
        .right(4);
    for (operation, stats) in &summary.operations {
        table.add_row(&[
            operation.clone(),
            stats.count.to_string(),
            format!("{:.0}", stats.average_ms),
            stats.max_ms.to_string(),
            format!("{:.1}%", stats.error_rate * 100.0),
        ]);
    }
    if !table.is_empty() {
        ui::blank();
        table.print();
    }
}

fn print_alerts(alerts: &[Alert]) {
    if alerts.is_empty() {
        ui::hint("No alerts");
        return;
    }
    let mut table = Table::new(&["ID", "Time", "Level", "Operation", "Message", "Ack"]).limit(4, 60);
    for alert in alerts {
        table.add_row(&[
            alert.id.clone(),
            alert.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            alert.level.to_string(),
            alert.operation.clone(),
            alert.message.clone(),
            if alert.acknowledged { "yes" } else { "" }.to_string(),
        ]);
    }
    table.print();
    if alerts.iter().any(|a| !a.acknowledged) {
        ui::hint("Acknowledge with `membank monitor ack <id>`");
    }
}
