//! End-to-end tracker workflow over a temporary workspace.

use chrono::{TimeZone, Utc};
use membank_tracker::{FeedbackTracker, ImprovementCycle, JsonTaskStorage, PerformanceMonitor, TaskService};
use membank_types::config::{ImprovementConfig, MonitoringConfig};
use membank_types::feedback::{FeedbackSubmission, IssueReport, Severity};
use membank_types::review::ReviewKind;
use membank_types::task::{NewTask, TaskStatus};

#[test]
fn test_tasks_persist_across_services() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".taskmaster/tasks/tasks.json");

    let first = TaskService::new(JsonTaskStorage::new(&path));
    first.create_task(NewTask::new("Write docs", "")).unwrap();
    first.create_task(NewTask::new("Ship", "")).unwrap();
    first.set_status(1, TaskStatus::Done).unwrap();

    let second = TaskService::new(JsonTaskStorage::new(&path));
    let tasks = second.get_all_tasks().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].status, TaskStatus::Done);
    assert_eq!(second.next_task().unwrap().unwrap().title, "Ship");
}

#[test]
fn test_feedback_and_metrics_feed_review() {
    let dir = tempfile::tempdir().unwrap();
    let monitoring = MonitoringConfig::default();
    let feedback = FeedbackTracker::new(dir.path().join("feedback"), 100);
    let monitor = PerformanceMonitor::new(&dir.path().join("monitoring"), &monitoring);
    let cycle = ImprovementCycle::new(
        &dir.path().join("improvement"),
        &ImprovementConfig::default(),
        &monitoring,
        feedback.clone(),
        monitor.clone(),
    );

    feedback
        .submit_feedback(FeedbackSubmission::rating(9))
        .unwrap();
    feedback
        .report_issue(IssueReport {
            title: "Search crashes on empty index".to_string(),
            description: String::new(),
            severity: Severity::Critical,
            component: Some("search".to_string()),
        })
        .unwrap();
    monitor.record("consult", 40, true).unwrap();

    let now = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
    let record = cycle.run_review(ReviewKind::Quarterly, now).unwrap();
    assert_eq!(record.open_issues, 1);
    assert_eq!(record.action_ids.len(), 1);
    assert!(record.findings[0].contains("critical/high"));

    let status = cycle.status(now).unwrap();
    assert_eq!(status.total_reviews, 1);
    assert_eq!(status.pending_actions, 1);
    assert_eq!(status.last_review.unwrap().id, record.id);
    let quarterly = status
        .schedules
        .iter()
        .find(|s| s.kind == ReviewKind::Quarterly)
        .unwrap();
    assert_eq!(
        quarterly.next_run,
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
    );
}
