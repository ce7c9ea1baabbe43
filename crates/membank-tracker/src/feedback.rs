//! Feedback, issue and survey collection.
//!
//! Each record kind is a capped JSON array under the feedback directory.
//! Submitting feedback classifies its priority from the rating, category and
//! comment text.

use crate::json_log::CappedLog;
use chrono::{DateTime, Utc};
use membank_types::error::{MembankError, MembankResult};
use membank_types::feedback::{
    FeedbackCategory, FeedbackEntry, FeedbackPriority, FeedbackStatus, FeedbackSubmission,
    FeedbackSummary, Issue, IssueReport, SurveyResponse, MAX_RATING, MAX_SURVEY_SCORE, MIN_RATING,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Comment phrases that force HIGH priority.
const URGENT_KEYWORDS: &[&str] = &["crash", "broken", "data loss", "urgent", "blocker", "security"];

/// `<prefix>-<unix ms>-<6 random alphanumerics>`.
pub fn record_id(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{prefix}-{}-{}", now.timestamp_millis(), suffix.to_lowercase())
}

/// HIGH for low ratings, urgent wording or a poorly rated bug; MEDIUM up to
/// 6; LOW above.
pub fn classify_priority(rating: u8, category: FeedbackCategory, comment: &str) -> FeedbackPriority {
    let comment = comment.to_lowercase();
    let urgent = URGENT_KEYWORDS.iter().any(|k| comment.contains(k));
    if rating <= 3 || urgent || (category == FeedbackCategory::Bug && rating <= 5) {
        FeedbackPriority::High
    } else if rating <= 6 {
        FeedbackPriority::Medium
    } else {
        FeedbackPriority::Low
    }
}

/// Feedback store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FeedbackTracker {
    dir: PathBuf,
    feedback: CappedLog,
    issues: CappedLog,
    surveys: CappedLog,
}

impl FeedbackTracker {
    pub fn new(dir: impl Into<PathBuf>, max_entries: usize) -> Self {
        let dir = dir.into();
        Self {
            feedback: CappedLog::new(dir.join("feedback.json"), max_entries),
            issues: CappedLog::new(dir.join("issues.json"), max_entries),
            surveys: CappedLog::new(dir.join("surveys.json"), max_entries),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn submit_feedback(&self, submission: FeedbackSubmission) -> MembankResult<FeedbackEntry> {
        if !(MIN_RATING..=MAX_RATING).contains(&submission.rating) {
            return Err(MembankError::InvalidInput(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                submission.rating
            )));
        }
        let now = Utc::now();
        let entry = FeedbackEntry {
            id: record_id("fb", now),
            timestamp: now,
            rating: submission.rating,
            category: submission.category,
            priority: classify_priority(
                submission.rating,
                submission.category,
                &submission.comment,
            ),
            comment: submission.comment,
            tags: submission.tags,
            status: FeedbackStatus::Open,
        };
        self.feedback.append(entry.clone())?;
        info!(id = %entry.id, rating = entry.rating, priority = %entry.priority, "Feedback recorded");
        Ok(entry)
    }

    pub fn report_issue(&self, report: IssueReport) -> MembankResult<Issue> {
        if report.title.trim().is_empty() {
            return Err(MembankError::InvalidInput(
                "issue title must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        let issue = Issue {
            id: record_id("issue", now),
            timestamp: now,
            title: report.title,
            description: report.description,
            severity: report.severity,
            component: report.component,
            status: FeedbackStatus::Open,
            resolved_at: None,
        };
        self.issues.append(issue.clone())?;
        info!(id = %issue.id, severity = %issue.severity, "Issue reported");
        Ok(issue)
    }

    pub fn update_issue_status(&self, id: &str, status: FeedbackStatus) -> MembankResult<Issue> {
        let mut issues: Vec<Issue> = self.issues.load();
        let issue = issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| MembankError::NotFound(format!("issue '{id}'")))?;
        issue.status = status;
        issue.resolved_at = match status {
            FeedbackStatus::Resolved => Some(Utc::now()),
            _ => None,
        };
        let updated = issue.clone();
        self.issues.save(&issues)?;
        info!(id, status = %status, "Issue status updated");
        Ok(updated)
    }

    /// Record survey answers (question → 1..=5).
    pub fn submit_survey(
        &self,
        answers: BTreeMap<String, u8>,
        comment: String,
    ) -> MembankResult<SurveyResponse> {
        if answers.is_empty() {
            return Err(MembankError::InvalidInput(
                "survey needs at least one answer".to_string(),
            ));
        }
        if let Some((question, score)) = answers
            .iter()
            .find(|(_, s)| !(1..=MAX_SURVEY_SCORE).contains(*s))
        {
            return Err(MembankError::InvalidInput(format!(
                "answer to '{question}' must be between 1 and {MAX_SURVEY_SCORE}, got {score}"
            )));
        }
        let now = Utc::now();
        let response = SurveyResponse {
            id: record_id("survey", now),
            timestamp: now,
            answers,
            comment,
        };
        self.surveys.append(response.clone())?;
        info!(id = %response.id, "Survey response recorded");
        Ok(response)
    }

    pub fn feedback(&self) -> Vec<FeedbackEntry> {
        self.feedback.load()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues.load()
    }

    pub fn surveys(&self) -> Vec<SurveyResponse> {
        self.surveys.load()
    }

    pub fn summary(&self) -> FeedbackSummary {
        let feedback = self.feedback();
        let issues = self.issues();
        let surveys = self.surveys();

        let mut summary = FeedbackSummary {
            total_feedback: feedback.len(),
            total_issues: issues.len(),
            survey_responses: surveys.len(),
            ..Default::default()
        };
        if !feedback.is_empty() {
            let total: u64 = feedback.iter().map(|f| f.rating as u64).sum();
            summary.average_rating = Some(total as f64 / feedback.len() as f64);
        }
        for entry in &feedback {
            *summary
                .by_category
                .entry(entry.category.to_string())
                .or_insert(0) += 1;
            *summary
                .by_priority
                .entry(entry.priority.to_string())
                .or_insert(0) += 1;
        }
        for issue in issues.iter().filter(|i| i.status != FeedbackStatus::Resolved) {
            summary.open_issues += 1;
            *summary
                .open_issues_by_severity
                .entry(issue.severity.to_string())
                .or_insert(0) += 1;
        }

        let mut totals: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for response in &surveys {
            for (question, score) in &response.answers {
                let entry = totals.entry(question.clone()).or_insert((0, 0));
                entry.0 += *score as u64;
                entry.1 += 1;
            }
        }
        summary.survey_averages = totals
            .into_iter()
            .map(|(q, (sum, n))| (q, sum as f64 / n as f64))
            .collect();
        summary
    }

    /// Render the markdown report and write it to `reports/feedback-<date>.md`.
    pub fn report(&self) -> MembankResult<(PathBuf, String)> {
        self.report_at(Utc::now())
    }

    pub fn report_at(&self, now: DateTime<Utc>) -> MembankResult<(PathBuf, String)> {
        let markdown = render_report(&self.summary(), &self.issues(), now);
        let path = self
            .dir
            .join("reports")
            .join(format!("feedback-{}.md", now.format("%Y-%m-%d")));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &markdown)?;
        info!(path = %path.display(), "Feedback report written");
        Ok((path, markdown))
    }
}

fn render_report(summary: &FeedbackSummary, issues: &[Issue], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Feedback Report ({})\n", now.format("%Y-%m-%d"));
    let _ = writeln!(out, "## Overview\n");
    let _ = writeln!(out, "- Feedback entries: {}", summary.total_feedback);
    match summary.average_rating {
        Some(avg) => {
            let _ = writeln!(out, "- Average rating: {avg:.1}/{MAX_RATING}");
        }
        None => {
            let _ = writeln!(out, "- Average rating: n/a");
        }
    }
    let _ = writeln!(
        out,
        "- Issues: {} ({} open)",
        summary.total_issues, summary.open_issues
    );
    let _ = writeln!(out, "- Survey responses: {}\n", summary.survey_responses);

    if !summary.by_priority.is_empty() {
        let _ = writeln!(out, "## By priority\n");
        for (priority, count) in &summary.by_priority {
            let _ = writeln!(out, "- {priority}: {count}");
        }
        let _ = writeln!(out);
    }
    if !summary.by_category.is_empty() {
        let _ = writeln!(out, "## By category\n");
        for (category, count) in &summary.by_category {
            let _ = writeln!(out, "- {category}: {count}");
        }
        let _ = writeln!(out);
    }

    let mut open: Vec<&Issue> = issues
        .iter()
        .filter(|i| i.status != FeedbackStatus::Resolved)
        .collect();
    if !open.is_empty() {
        open.sort_by_key(|i| (i.severity, i.timestamp));
        let _ = writeln!(out, "## Open issues\n");
        for issue in open {
            let component = issue
                .component
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- **{}**{} {} (`{}`)",
                issue.severity, component, issue.title, issue.id
            );
        }
        let _ = writeln!(out);
    }

    if !summary.survey_averages.is_empty() {
        let _ = writeln!(out, "## Survey averages\n");
        for (question, avg) in &summary.survey_averages {
            let _ = writeln!(out, "- {question}: {avg:.2}/{MAX_SURVEY_SCORE}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_types::feedback::Severity;

    fn tracker() -> (tempfile::TempDir, FeedbackTracker) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FeedbackTracker::new(dir.path().join("feedback"), 100);
        (dir, tracker)
    }

    #[test]
    fn test_priority_classification() {
        assert_eq!(
            classify_priority(2, FeedbackCategory::General, ""),
            FeedbackPriority::High
        );
        assert_ne!(
            classify_priority(8, FeedbackCategory::General, "works well"),
            FeedbackPriority::High
        );
        assert_eq!(
            classify_priority(8, FeedbackCategory::General, "Saving caused DATA LOSS"),
            FeedbackPriority::High
        );
        assert_eq!(
            classify_priority(5, FeedbackCategory::Bug, ""),
            FeedbackPriority::High
        );
        assert_eq!(
            classify_priority(5, FeedbackCategory::Feature, ""),
            FeedbackPriority::Medium
        );
        assert_eq!(
            classify_priority(9, FeedbackCategory::Feature, ""),
            FeedbackPriority::Low
        );
    }

    #[test]
    fn test_submit_feedback_persists() {
        let (_dir, tracker) = tracker();
        let entry = tracker.submit_feedback(FeedbackSubmission::rating(2)).unwrap();
        assert_eq!(entry.priority, FeedbackPriority::High);
        assert!(entry.id.starts_with("fb-"));
        assert_eq!(entry.id.rsplit('-').next().unwrap().len(), 6);
        assert_eq!(tracker.feedback().len(), 1);
    }

    #[test]
    fn test_rating_out_of_range() {
        let (_dir, tracker) = tracker();
        assert!(tracker.submit_feedback(FeedbackSubmission::rating(0)).is_err());
        assert!(tracker.submit_feedback(FeedbackSubmission::rating(11)).is_err());
        assert!(tracker.feedback().is_empty());
    }

    #[test]
    fn test_feedback_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FeedbackTracker::new(dir.path(), 2);
        for rating in [1, 5, 9] {
            tracker.submit_feedback(FeedbackSubmission::rating(rating)).unwrap();
        }
        let ratings: Vec<u8> = tracker.feedback().iter().map(|f| f.rating).collect();
        assert_eq!(ratings, vec![5, 9]);
    }

    #[test]
    fn test_issue_lifecycle() {
        let (_dir, tracker) = tracker();
        let issue = tracker
            .report_issue(IssueReport {
                title: "Search is slow".to_string(),
                description: String::new(),
                severity: Severity::High,
                component: Some("search".to_string()),
            })
            .unwrap();
        assert_eq!(tracker.summary().open_issues, 1);
        let resolved = tracker
            .update_issue_status(&issue.id, FeedbackStatus::Resolved)
            .unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(tracker.summary().open_issues, 0);
        assert!(tracker
            .update_issue_status("issue-missing", FeedbackStatus::Open)
            .is_err());
    }

    #[test]
    fn test_survey_validation_and_averages() {
        let (_dir, tracker) = tracker();
        let bad = BTreeMap::from([("ease".to_string(), 6)]);
        assert!(tracker.submit_survey(bad, String::new()).is_err());
        for score in [4, 5] {
            tracker
                .submit_survey(BTreeMap::from([("ease".to_string(), score)]), String::new())
                .unwrap();
        }
        let summary = tracker.summary();
        assert_eq!(summary.survey_responses, 2);
        assert!((summary.survey_averages["ease"] - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_summary_groups() {
        let (_dir, tracker) = tracker();
        let mut bug = FeedbackSubmission::rating(4);
        bug.category = FeedbackCategory::Bug;
        tracker.submit_feedback(bug).unwrap();
        tracker.submit_feedback(FeedbackSubmission::rating(8)).unwrap();
        let summary = tracker.summary();
        assert_eq!(summary.total_feedback, 2);
        assert_eq!(summary.average_rating, Some(6.0));
        assert_eq!(summary.by_category["bug"], 1);
        assert_eq!(summary.by_priority["HIGH"], 1);
        assert_eq!(summary.by_priority["LOW"], 1);
    }

    #[test]
    fn test_report_written() {
        let (_dir, tracker) = tracker();
        tracker.submit_feedback(FeedbackSubmission::rating(7)).unwrap();
        let now = Utc::now();
        let (path, markdown) = tracker.report_at(now).unwrap();
        assert!(path.ends_with(format!("reports/feedback-{}.md", now.format("%Y-%m-%d"))));
        assert!(markdown.contains("Average rating: 7.0/10"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), markdown);
    }
}
