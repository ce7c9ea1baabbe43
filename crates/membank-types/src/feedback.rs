//! Feedback, issue and survey records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest accepted feedback rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted feedback rating.
pub const MAX_RATING: u8 = 10;
/// Highest accepted survey answer (answers are 1..=5).
pub const MAX_SURVEY_SCORE: u8 = 5;

/// What the feedback is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    #[default]
    General,
    Bug,
    Feature,
    Performance,
    Usability,
    Documentation,
}

impl std::fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::General => "general",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Performance => "performance",
            Self::Usability => "usability",
            Self::Documentation => "documentation",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for FeedbackCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "performance" => Ok(Self::Performance),
            "usability" => Ok(Self::Usability),
            "documentation" | "docs" => Ok(Self::Documentation),
            other => Err(format!("unknown feedback category '{other}'")),
        }
    }
}

/// Triage priority assigned on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackPriority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for FeedbackPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        f.write_str(s)
    }
}

/// Status shared by feedback entries and issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    Open,
    Acknowledged,
    InProgress,
    Resolved,
}

impl std::fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "acknowledged" | "ack" => Ok(Self::Acknowledged),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "resolved" | "closed" => Ok(Self::Resolved),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A stored feedback entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub rating: u8,
    pub category: FeedbackCategory,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub priority: FeedbackPriority,
    #[serde(default)]
    pub status: FeedbackStatus,
}

/// Input for `submit_feedback`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub rating: u8,
    #[serde(default)]
    pub category: FeedbackCategory,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FeedbackSubmission {
    /// Feedback carrying only a rating.
    pub fn rating(rating: u8) -> Self {
        Self {
            rating,
            ..Default::default()
        }
    }
}

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// A reported issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub status: FeedbackStatus,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for `report_issue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub component: Option<String>,
}

/// A survey response: question id → score (1..=5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub answers: BTreeMap<String, u8>,
    #[serde(default)]
    pub comment: String,
}

/// Aggregates over all stored feedback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_feedback: usize,
    pub average_rating: Option<f64>,
    pub by_category: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub total_issues: usize,
    pub open_issues: usize,
    pub open_issues_by_severity: BTreeMap<String, usize>,
    pub survey_responses: usize,
    pub survey_averages: BTreeMap<String, f64>,
}
