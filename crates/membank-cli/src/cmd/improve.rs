//! `membank improve ...`

use super::parse_arg;
use crate::cli::{ActionCommands, ImproveCommands, ScheduleCommands};
use crate::table::Table;
use crate::ui;
use chrono::Utc;
use membank_kernel::Membank;
use membank_types::error::MembankResult;
use membank_types::review::{ActionItem, ReviewKind, ReviewRecord, ReviewSchedule};

pub fn run(membank: &Membank, command: ImproveCommands) -> MembankResult<()> {
    let cycle = membank.improvement();
    let now = Utc::now();
    match command {
        ImproveCommands::Status { json } => {
            let status = cycle.status(now)?;
            if json {
                ui::print_json(&status);
                return Ok(());
            }
            ui::section("Improvement cycle");
            ui::kv("Reviews", &status.total_reviews.to_string());
            match &status.last_review {
                Some(last) => ui::kv(
                    "Last review",
                    &format!("{} ({})", last.kind, last.timestamp.format("%Y-%m-%d %H:%M")),
                ),
                None => ui::kv("Last review", "never"),
            }
            if status.pending_actions > 0 {
                ui::kv_warn("Pending", &status.pending_actions.to_string());
            } else {
                ui::kv_ok("Pending", "0");
            }
            ui::kv("Completed", &status.completed_actions.to_string());
            ui::blank();
            print_schedule(&status.schedules);
        }
        ImproveCommands::Review { kind, json } => {
            let record = cycle.run_review(parse_arg::<ReviewKind>(&kind)?, now)?;
            if json {
                ui::print_json(&record);
            } else {
                print_review(&record);
            }
        }
        ImproveCommands::Due { run } => {
            if run {
                let records = cycle.run_due_reviews(now)?;
                if records.is_empty() {
                    ui::hint("No reviews are due");
                }
                for record in &records {
                    print_review(record);
                    ui::blank();
                }
            } else {
                let due = cycle.due_reviews(now)?;
                if due.is_empty() {
                    ui::hint("No reviews are due");
                } else {
                    for kind in due {
                        ui::bullet(&format!("{kind} review is due"));
                    }
                    ui::hint("Run them with `membank improve due --run`");
                }
            }
        }
        ImproveCommands::Schedule(sub) => match sub {
            ScheduleCommands::Show => print_schedule(&cycle.schedules(now)?),
            ScheduleCommands::Enable { kind } => {
                let schedule = cycle.set_enabled(parse_arg::<ReviewKind>(&kind)?, true, now)?;
                ui::success(&format!(
                    "{} reviews enabled, next run {}",
                    schedule.kind,
                    schedule.next_run.format("%Y-%m-%d %H:%M UTC")
                ));
            }
            ScheduleCommands::Disable { kind } => {
                let schedule = cycle.set_enabled(parse_arg::<ReviewKind>(&kind)?, false, now)?;
                ui::success(&format!("{} reviews disabled", schedule.kind));
            }
        },
        ImproveCommands::Actions(sub) => match sub {
            ActionCommands::List { json } => {
                let actions = cycle.actions();
                if json {
                    ui::print_json(&actions);
                } else {
                    print_actions(&actions);
                }
            }
            ActionCommands::Pending => print_actions(&cycle.pending_actions()),
            ActionCommands::Complete { id } => {
                let action = cycle.complete_action(&id)?;
                ui::success(&format!("Completed: {}", action.description));
            }
        },
    }
    Ok(())
}

fn print_schedule(schedules: &[ReviewSchedule]) {
    let mut table = Table::new(&["Review", "Enabled", "Last run", "Next run"]);
    for s in schedules {
        table.add_row(&[
            s.kind.to_string(),
            if s.enabled { "yes" } else { "no" }.to_string(),
            s.last_run
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            s.next_run.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table.print();
}

fn print_review(record: &ReviewRecord) {
    ui::section(&format!(
        "{} review {}",
        record.kind,
        record.timestamp.format("%Y-%m-%d")
    ));
    for finding in &record.findings {
        ui::bullet(finding);
    }
    if !record.action_ids.is_empty() {
        ui::hint(&format!(
            "{} new action item(s): `membank improve actions pending`",
            record.action_ids.len()
        ));
    }
}

fn print_actions(actions: &[ActionItem]) {
    if actions.is_empty() {
        ui::hint("No action items");
        return;
    }
    let mut table = Table::new(&["ID", "Priority", "Status", "Description"]).limit(3, 70);
    for action in actions {
        table.add_row(&[
            action.id.clone(),
            action.priority.to_string(),
            format!("{:?}", action.status).to_lowercase(),
            action.description.clone(),
        ]);
    }
    table.print();
}
