//! Improvement review schedule, review records and action items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cadence of an improvement review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewKind {
    Weekly,
    Monthly,
    Quarterly,
}

impl ReviewKind {
    pub const ALL: [ReviewKind; 3] = [ReviewKind::Weekly, ReviewKind::Monthly, ReviewKind::Quarterly];
}

impl std::fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewKind::Weekly => f.write_str("weekly"),
            ReviewKind::Monthly => f.write_str("monthly"),
            ReviewKind::Quarterly => f.write_str("quarterly"),
        }
    }
}

impl std::str::FromStr for ReviewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weekly" => Ok(ReviewKind::Weekly),
            "monthly" => Ok(ReviewKind::Monthly),
            "quarterly" => Ok(ReviewKind::Quarterly),
            other => Err(format!("unknown review type '{other}'")),
        }
    }
}

/// Schedule state for one review kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSchedule {
    pub kind: ReviewKind,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
}

/// Action item status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Pending,
    Completed,
}

/// A follow-up produced by a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub review_id: String,
    pub description: String,
    pub priority: crate::feedback::FeedbackPriority,
    #[serde(default)]
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A completed review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub kind: ReviewKind,
    pub timestamp: DateTime<Utc>,
    pub findings: Vec<String>,
    pub action_ids: Vec<String>,
    pub average_rating: Option<f64>,
    pub open_issues: usize,
    pub error_rate: f64,
    pub average_response_ms: f64,
}

/// Snapshot shown by `improve status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementStatus {
    pub schedules: Vec<ReviewSchedule>,
    pub last_review: Option<ReviewRecord>,
    pub total_reviews: usize,
    pub pending_actions: usize,
    pub completed_actions: usize,
}
