//! Periodic improvement reviews.
//!
//! Reviews are not run by a timer. Each kind has a `last_run`/`next_run`
//! pair in `schedule.json`; whoever invokes [`ImprovementCycle::run_due_reviews`]
//! runs every enabled kind whose `next_run` has passed. Missed runs collapse
//! into one.

use crate::feedback::FeedbackTracker;
use crate::json_log::{read_json_or_default, write_json, CappedLog};
use crate::monitor::PerformanceMonitor;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use membank_types::config::{ImprovementConfig, MonitoringConfig};
use membank_types::error::{MembankError, MembankResult};
use membank_types::feedback::FeedbackPriority;
use membank_types::review::{
    ActionItem, ActionStatus, ImprovementStatus, ReviewKind, ReviewRecord, ReviewSchedule,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Satisfaction below this average rating is a finding.
const LOW_SATISFACTION: f64 = 6.0;

/// Survey questions averaging below this are a finding.
const LOW_SURVEY_SCORE: f64 = 3.0;

/// Action items kept per stored review.
const ACTIONS_PER_REVIEW: usize = 10;

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    date.and_time(time).and_utc()
}

fn first_of_month(year: i32, month0: u32) -> MembankResult<NaiveDate> {
    let (year, month0) = (year + (month0 / 12) as i32, month0 % 12);
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .ok_or_else(|| MembankError::Internal(format!("date {year}-{} out of range", month0 + 1)))
}

/// When a review of `kind` next falls due after `from`.
///
/// Weekly: the next Monday at `hour`:00 UTC strictly after `from`. Monthly:
/// the first of the next month. Quarterly: the first of the next quarter.
pub fn next_run_after(kind: ReviewKind, from: DateTime<Utc>, hour: u32) -> MembankResult<DateTime<Utc>> {
    let today = from.date_naive();
    match kind {
        ReviewKind::Weekly => {
            let days_to_monday = (7 - today.weekday().num_days_from_monday()) % 7;
            let candidate = at_hour(today + Duration::days(days_to_monday as i64), hour);
            if candidate > from {
                Ok(candidate)
            } else {
                Ok(candidate + Duration::days(7))
            }
        }
        ReviewKind::Monthly => Ok(at_hour(first_of_month(today.year(), today.month0() + 1)?, hour)),
        ReviewKind::Quarterly => {
            let next_quarter = (today.month0() / 3 + 1) * 3;
            Ok(at_hour(first_of_month(today.year(), next_quarter)?, hour))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    schedules: Vec<ReviewSchedule>,
}

/// Schedule, reviews and action items.
#[derive(Debug, Clone)]
pub struct ImprovementCycle {
    schedule_path: PathBuf,
    reviews: CappedLog,
    actions: CappedLog,
    review_hour: u32,
    feedback: FeedbackTracker,
    monitor: PerformanceMonitor,
    response_time_target_ms: u64,
    error_rate_threshold: f64,
}

impl ImprovementCycle {
    pub fn new(
        dir: &Path,
        config: &ImprovementConfig,
        monitoring: &MonitoringConfig,
        feedback: FeedbackTracker,
        monitor: PerformanceMonitor,
    ) -> Self {
        Self {
            schedule_path: dir.join("schedule.json"),
            reviews: CappedLog::new(dir.join("reviews.json"), config.max_reviews),
            actions: CappedLog::new(
                dir.join("actions.json"),
                config.max_reviews.saturating_mul(ACTIONS_PER_REVIEW),
            ),
            review_hour: config.review_hour,
            feedback,
            monitor,
            response_time_target_ms: monitoring.response_time_target_ms,
            error_rate_threshold: monitoring.error_rate_threshold,
        }
    }

    /// Every kind's schedule. Kinds missing from the file start enabled and
    /// are written back so their `next_run` stays fixed.
    pub fn schedules(&self, now: DateTime<Utc>) -> MembankResult<Vec<ReviewSchedule>> {
        let file: ScheduleFile = read_json_or_default(&self.schedule_path);
        let mut missing = false;
        let schedules = ReviewKind::ALL
            .iter()
            .map(|kind| match file.schedules.iter().find(|s| s.kind == *kind) {
                Some(existing) => Ok(existing.clone()),
                None => {
                    missing = true;
                    Ok(ReviewSchedule {
                        kind: *kind,
                        enabled: true,
                        last_run: None,
                        next_run: next_run_after(*kind, now, self.review_hour)?,
                    })
                }
            })
            .collect::<MembankResult<Vec<_>>>()?;
        if missing {
            self.save_schedules(schedules.clone())?;
        }
        Ok(schedules)
    }

    fn save_schedules(&self, schedules: Vec<ReviewSchedule>) -> MembankResult<()> {
        write_json(&self.schedule_path, &ScheduleFile { schedules })
    }

    /// Enable or disable a kind. Enabling recomputes `next_run` from `now`.
    pub fn set_enabled(
        &self,
        kind: ReviewKind,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> MembankResult<ReviewSchedule> {
        let mut schedules = self.schedules(now)?;
        let mut updated = None;
        for schedule in schedules.iter_mut().filter(|s| s.kind == kind) {
            schedule.enabled = enabled;
            if enabled {
                schedule.next_run = next_run_after(kind, now, self.review_hour)?;
            }
            updated = Some(schedule.clone());
        }
        self.save_schedules(schedules)?;
        info!(kind = %kind, enabled, "Review schedule updated");
        updated.ok_or_else(|| MembankError::NotFound(format!("schedule '{kind}'")))
    }

    /// Enabled kinds whose `next_run` is at or before `now`.
    pub fn due_reviews(&self, now: DateTime<Utc>) -> MembankResult<Vec<ReviewKind>> {
        Ok(self
            .schedules(now)?
            .into_iter()
            .filter(|s| s.enabled && s.next_run <= now)
            .map(|s| s.kind)
            .collect())
    }

    /// Run one review now regardless of schedule.
    pub fn run_review(&self, kind: ReviewKind, now: DateTime<Utc>) -> MembankResult<ReviewRecord> {
        let feedback = self.feedback.summary();
        let performance = self.monitor.summary();
        let mut actions: Vec<ActionItem> = self.actions.load();
        let carried_over = actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .count();

        let review_id = uuid::Uuid::new_v4().to_string();
        let mut findings = Vec::new();
        let mut new_actions: Vec<(FeedbackPriority, String)> = Vec::new();

        if let Some(avg) = feedback.average_rating {
            if avg < LOW_SATISFACTION {
                findings.push(format!(
                    "Average satisfaction {avg:.1}/10 is below {LOW_SATISFACTION:.0}"
                ));
                new_actions.push((
                    FeedbackPriority::High,
                    "Investigate the causes of low satisfaction ratings".to_string(),
                ));
            }
        }
        let high_feedback = feedback.by_priority.get("HIGH").copied().unwrap_or(0);
        if high_feedback > 0 {
            findings.push(format!("{high_feedback} high-priority feedback entries"));
            new_actions.push((
                FeedbackPriority::High,
                format!("Triage {high_feedback} high-priority feedback entries"),
            ));
        }
        let severe_issues: usize = ["critical", "high"]
            .iter()
            .filter_map(|s| feedback.open_issues_by_severity.get(*s))
            .sum();
        if severe_issues > 0 {
            findings.push(format!("{severe_issues} open critical/high issues"));
            new_actions.push((
                FeedbackPriority::High,
                format!("Resolve {severe_issues} open critical/high issues"),
            ));
        }
        for (question, avg) in &feedback.survey_averages {
            if *avg < LOW_SURVEY_SCORE {
                findings.push(format!("Survey question '{question}' averages {avg:.1}/5"));
                new_actions.push((
                    FeedbackPriority::Low,
                    format!("Follow up on survey question '{question}'"),
                ));
            }
        }
        if performance.samples > 0 && performance.p95_ms > self.response_time_target_ms {
            let slowest = performance
                .operations
                .iter()
                .max_by(|a, b| a.1.average_ms.total_cmp(&b.1.average_ms))
                .map(|(op, _)| op.as_str())
                .unwrap_or("unknown");
            findings.push(format!(
                "p95 response time {} ms exceeds the {} ms target (slowest: {slowest})",
                performance.p95_ms, self.response_time_target_ms
            ));
            new_actions.push((
                FeedbackPriority::Medium,
                format!("Reduce latency of '{slowest}'"),
            ));
        }
        if performance.samples > 0 && performance.error_rate > self.error_rate_threshold {
            findings.push(format!(
                "Error rate {:.1}% exceeds the {:.1}% threshold",
                performance.error_rate * 100.0,
                self.error_rate_threshold * 100.0
            ));
            new_actions.push((
                FeedbackPriority::High,
                "Investigate failing operations".to_string(),
            ));
        }
        if carried_over > 0 {
            findings.push(format!(
                "{carried_over} action items still pending from earlier reviews"
            ));
        }
        if findings.is_empty() {
            findings.push("No problems detected".to_string());
        }

        let mut action_ids = Vec::with_capacity(new_actions.len());
        for (priority, description) in new_actions {
            let id = uuid::Uuid::new_v4().to_string();
            action_ids.push(id.clone());
            actions.push(ActionItem {
                id,
                review_id: review_id.clone(),
                description,
                priority,
                status: ActionStatus::Pending,
                created_at: now,
                completed_at: None,
            });
        }
        self.actions.save(&actions)?;

        let record = ReviewRecord {
            id: review_id,
            kind,
            timestamp: now,
            findings,
            action_ids,
            average_rating: feedback.average_rating,
            open_issues: feedback.open_issues,
            error_rate: performance.error_rate,
            average_response_ms: performance.average_ms,
        };
        self.reviews.append(record.clone())?;

        let mut schedules = self.schedules(now)?;
        for schedule in schedules.iter_mut().filter(|s| s.kind == kind) {
            schedule.last_run = Some(now);
            schedule.next_run = next_run_after(kind, now, self.review_hour)?;
        }
        self.save_schedules(schedules)?;

        info!(
            kind = %kind,
            findings = record.findings.len(),
            actions = record.action_ids.len(),
            "Improvement review complete"
        );
        Ok(record)
    }

    /// Run every due review.
    pub fn run_due_reviews(&self, now: DateTime<Utc>) -> MembankResult<Vec<ReviewRecord>> {
        self.due_reviews(now)?
            .into_iter()
            .map(|kind| self.run_review(kind, now))
            .collect()
    }

    pub fn reviews(&self) -> Vec<ReviewRecord> {
        self.reviews.load()
    }

    pub fn actions(&self) -> Vec<ActionItem> {
        self.actions.load()
    }

    pub fn pending_actions(&self) -> Vec<ActionItem> {
        self.actions()
            .into_iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .collect()
    }

    pub fn complete_action(&self, id: &str) -> MembankResult<ActionItem> {
        let mut actions: Vec<ActionItem> = self.actions.load();
        let action = actions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| MembankError::NotFound(format!("action '{id}'")))?;
        action.status = ActionStatus::Completed;
        action.completed_at = Some(Utc::now());
        let completed = action.clone();
        self.actions.save(&actions)?;
        info!(id, "Action completed");
        Ok(completed)
    }

    pub fn status(&self, now: DateTime<Utc>) -> MembankResult<ImprovementStatus> {
        let reviews = self.reviews();
        let actions = self.actions();
        let pending = actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .count();
        Ok(ImprovementStatus {
            schedules: self.schedules(now)?,
            total_reviews: reviews.len(),
            last_review: reviews.last().cloned(),
            pending_actions: pending,
            completed_actions: actions.len() - pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use membank_types::feedback::FeedbackSubmission;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn cycle(dir: &Path) -> ImprovementCycle {
        let monitoring = MonitoringConfig {
            response_time_target_ms: 100,
            ..Default::default()
        };
        ImprovementCycle::new(
            &dir.join("improvement"),
            &ImprovementConfig::default(),
            &monitoring,
            FeedbackTracker::new(dir.join("feedback"), 100),
            PerformanceMonitor::new(&dir.join("monitoring"), &monitoring),
        )
    }

    #[test]
    fn test_next_weekly_is_following_monday() {
        // 2025-01-01 is a Wednesday.
        assert_eq!(
            next_run_after(ReviewKind::Weekly, utc(2025, 1, 1, 12), 9).unwrap(),
            utc(2025, 1, 6, 9)
        );
        // Monday before the review hour: same day.
        assert_eq!(
            next_run_after(ReviewKind::Weekly, utc(2025, 1, 6, 8), 9).unwrap(),
            utc(2025, 1, 6, 9)
        );
        // Monday exactly at the review hour: strictly after, so next week.
        assert_eq!(
            next_run_after(ReviewKind::Weekly, utc(2025, 1, 6, 9), 9).unwrap(),
            utc(2025, 1, 13, 9)
        );
    }

    #[test]
    fn test_next_monthly_and_quarterly() {
        assert_eq!(
            next_run_after(ReviewKind::Monthly, utc(2025, 12, 15, 0), 9).unwrap(),
            utc(2026, 1, 1, 9)
        );
        assert_eq!(
            next_run_after(ReviewKind::Quarterly, utc(2025, 2, 10, 0), 9).unwrap(),
            utc(2025, 4, 1, 9)
        );
        assert_eq!(
            next_run_after(ReviewKind::Quarterly, utc(2025, 11, 30, 0), 9).unwrap(),
            utc(2026, 1, 1, 9)
        );
    }

    #[test]
    fn test_due_reviews_and_run() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = cycle(dir.path());
        let start = utc(2025, 1, 1, 12);
        assert!(cycle.due_reviews(start).unwrap().is_empty());
        cycle.set_enabled(ReviewKind::Weekly, true, start).unwrap();

        let later = utc(2025, 1, 7, 0);
        assert_eq!(cycle.due_reviews(later).unwrap(), vec![ReviewKind::Weekly]);
        let records = cycle.run_due_reviews(later).unwrap();
        assert_eq!(records.len(), 1);
        assert!(cycle.due_reviews(later).unwrap().is_empty());

        let status = cycle.status(later).unwrap();
        let weekly = status
            .schedules
            .iter()
            .find(|s| s.kind == ReviewKind::Weekly)
            .unwrap();
        assert_eq!(weekly.last_run, Some(later));
        assert_eq!(weekly.next_run, utc(2025, 1, 13, 9));
        assert_eq!(status.total_reviews, 1);
    }

    #[test]
    fn test_disabled_kind_never_due() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = cycle(dir.path());
        let start = utc(2025, 1, 1, 12);
        cycle.set_enabled(ReviewKind::Monthly, false, start).unwrap();
        let due = cycle.due_reviews(utc(2025, 6, 1, 12)).unwrap();
        assert!(!due.contains(&ReviewKind::Monthly));
        assert!(due.contains(&ReviewKind::Weekly));
    }

    #[test]
    fn test_review_findings_create_actions() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = cycle(dir.path());
        cycle
            .feedback
            .submit_feedback(FeedbackSubmission::rating(2))
            .unwrap();
        cycle.monitor.record("consult", 500, true).unwrap();

        let now = utc(2025, 3, 3, 10);
        let record = cycle.run_review(ReviewKind::Monthly, now).unwrap();
        assert!(record.findings.iter().any(|f| f.contains("satisfaction")));
        assert!(record.findings.iter().any(|f| f.contains("p95")));
        assert_eq!(cycle.pending_actions().len(), record.action_ids.len());

        let first = record.action_ids[0].clone();
        cycle.complete_action(&first).unwrap();
        assert_eq!(cycle.pending_actions().len(), record.action_ids.len() - 1);
        assert!(cycle.complete_action("missing").is_err());

        let second = cycle.run_review(ReviewKind::Weekly, now).unwrap();
        assert!(second.findings.iter().any(|f| f.contains("still pending")));
    }

    #[test]
    fn test_clean_review() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = cycle(dir.path());
        let record = cycle.run_review(ReviewKind::Weekly, utc(2025, 1, 1, 0)).unwrap();
        assert_eq!(record.findings, vec!["No problems detected".to_string()]);
        assert!(record.action_ids.is_empty());
    }
}
