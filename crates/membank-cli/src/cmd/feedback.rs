//! `membank feedback ...`

use super::parse_arg;
use crate::cli::FeedbackCommands;
use crate::ui;
use membank_kernel::Membank;
use membank_types::error::{MembankError, MembankResult};
use membank_types::feedback::{
    FeedbackCategory, FeedbackStatus, FeedbackSubmission, FeedbackSummary, IssueReport, Severity,
};
use std::collections::BTreeMap;

pub fn run(membank: &Membank, command: FeedbackCommands) -> MembankResult<()> {
    let tracker = membank.feedback();
    match command {
        FeedbackCommands::Submit {
            rating,
            category,
            comment,
            tags,
        } => {
            let submission = FeedbackSubmission {
                rating,
                category: category
                    .as_deref()
                    .map(parse_arg::<FeedbackCategory>)
                    .transpose()?
                    .unwrap_or_default(),
                comment,
                tags,
            };
            let entry = tracker.submit_feedback(submission)?;
            ui::success(&format!("Recorded {} ({} priority)", entry.id, entry.priority));
        }
        FeedbackCommands::Issue {
            title,
            severity,
            description,
            component,
        } => {
            let issue = tracker.report_issue(IssueReport {
                title,
                description,
                severity: parse_arg::<Severity>(&severity)?,
                component,
            })?;
            ui::success(&format!("Reported {} [{}]", issue.id, issue.severity));
        }
        FeedbackCommands::IssueStatus { id, status } => {
            let issue = tracker.update_issue_status(&id, parse_arg::<FeedbackStatus>(&status)?)?;
            ui::success(&format!("Issue {} is now {}", issue.id, issue.status));
        }
        FeedbackCommands::Survey { answers, comment } => {
            let answers = parse_answers(&answers)?;
            let response = tracker.submit_survey(answers, comment)?;
            ui::success(&format!("Recorded survey {}", response.id));
        }
        FeedbackCommands::Summary { json } => {
            let summary = tracker.summary();
            if json {
                ui::print_json(&summary);
            } else {
                print_summary(&summary);
            }
        }
        FeedbackCommands::Report => {
            let (path, _) = tracker.report()?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}

/// `question=score` pairs.
fn parse_answers(raw: &[String]) -> MembankResult<BTreeMap<String, u8>> {
    raw.iter()
        .map(|pair| {
            let (question, score) = pair.split_once('=').ok_or_else(|| {
                MembankError::InvalidInput(format!("expected question=score, got '{pair}'"))
            })?;
            let score = score.trim().parse::<u8>().map_err(|_| {
                MembankError::InvalidInput(format!("score for '{question}' is not a number"))
            })?;
            Ok((question.trim().to_string(), score))
        })
        .collect()
}

fn print_summary(summary: &FeedbackSummary) {
    ui::section("Feedback");
    ui::kv("Entries", &summary.total_feedback.to_string());
    match summary.average_rating {
        Some(avg) if avg >= 7.0 => ui::kv_ok("Avg rating", &format!("{avg:.1}/10")),
        Some(avg) => ui::kv_warn("Avg rating", &format!("{avg:.1}/10")),
        None => ui::kv("Avg rating", "-"),
    }
    for (priority, count) in &summary.by_priority {
        ui::bullet(&format!("{priority}: {count}"));
    }
    ui::blank();
    ui::section("Issues");
    ui::kv("Total", &summary.total_issues.to_string());
    ui::kv("Open", &summary.open_issues.to_string());
    for (severity, count) in &summary.open_issues_by_severity {
        ui::bullet(&format!("{severity}: {count}"));
    }
    if summary.survey_responses > 0 {
        ui::blank();
        ui::section("Surveys");
        ui::kv("Responses", &summary.survey_responses.to_string());
        for (question, avg) in &summary.survey_averages {
            ui::bullet(&format!("{question}: {avg:.1}/5"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answers() {
        let parsed = parse_answers(&["ease=4".to_string(), " speed = 5".to_string()]).unwrap();
        assert_eq!(parsed["ease"], 4);
        assert_eq!(parsed["speed"], 5);
        assert!(parse_answers(&["ease".to_string()]).is_err());
        assert!(parse_answers(&["ease=lots".to_string()]).is_err());
    }
}
