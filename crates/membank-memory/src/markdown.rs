//! Markdown helpers: `##` section splitting and the decision log.

use chrono::NaiveDate;
use membank_types::error::MembankResult;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

/// A `##` section of a markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Header text without the leading `## `. Empty for the preamble.
    pub title: String,
    pub body: String,
    /// Byte offset of the section start within the document.
    pub offset: usize,
}

/// Split on lines starting with `## `. Text before the first header becomes a
/// section with an empty title (omitted when blank).
pub fn split_sections(markdown: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title = String::new();
    let mut body = String::new();
    let mut offset = 0;
    let mut pos = 0;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if let Some(header) = trimmed.strip_prefix("## ") {
            if !title.is_empty() || !body.trim().is_empty() {
                sections.push(Section {
                    title: std::mem::take(&mut title),
                    body: std::mem::take(&mut body).trim().to_string(),
                    offset,
                });
            }
            body.clear();
            title = header.trim().to_string();
            offset = pos;
        } else {
            body.push_str(line);
        }
        pos += line.len();
    }
    if !title.is_empty() || !body.trim().is_empty() {
        sections.push(Section {
            title,
            body: body.trim().to_string(),
            offset,
        });
    }
    sections
}

/// One entry of the decision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub date: Option<NaiveDate>,
    pub title: String,
    pub body: String,
}

impl Decision {
    /// Title and body, for similarity scoring.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

fn dated_title() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(\d{4}-\d{2}-\d{2})\]\s*(.*)$").expect("static regex")
    })
}

/// Every titled `##` section is a decision. A leading `[YYYY-MM-DD]` in the
/// title is parsed as the decision date.
pub fn parse_decision_log(markdown: &str) -> Vec<Decision> {
    split_sections(markdown)
        .into_iter()
        .filter(|s| !s.title.is_empty())
        .map(|s| {
            let (date, title) = match dated_title().captures(&s.title) {
                Some(caps) => (
                    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok(),
                    caps[2].trim().to_string(),
                ),
                None => (None, s.title.clone()),
            };
            Decision {
                date,
                title,
                body: s.body,
            }
        })
        .collect()
}

/// Append a dated decision entry, creating the log with a heading if needed.
pub fn append_decision(path: &Path, title: &str, body: &str, date: NaiveDate) -> MembankResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if is_new {
        writeln!(file, "# Decision Log")?;
    }
    write!(
        file,
        "\n## [{}] {}\n\n{}\n",
        date.format("%Y-%m-%d"),
        title.trim(),
        body.trim()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "# Decision Log\n\nIntro text.\n\n## [2024-03-01] Use SQLite\n\nFewer moving parts.\n\n### Detail\nstill body\n## Undated choice\nBody two\n";

    #[test]
    fn test_split_sections() {
        let sections = split_sections(LOG);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "");
        assert!(sections[0].body.contains("Intro text."));
        assert_eq!(sections[1].title, "[2024-03-01] Use SQLite");
        assert!(sections[1].body.contains("### Detail"));
        assert_eq!(sections[2].title, "Undated choice");
        assert_eq!(&LOG[sections[2].offset..sections[2].offset + 3], "## ");
    }

    #[test]
    fn test_parse_decision_log() {
        let decisions = parse_decision_log(LOG);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(decisions[0].title, "Use SQLite");
        assert_eq!(decisions[1].date, None);
        assert_eq!(decisions[1].body, "Body two");
    }

    #[test]
    fn test_no_headers() {
        assert!(parse_decision_log("just text").is_empty());
        assert_eq!(split_sections("").len(), 0);
    }

    #[test]
    fn test_append_decision_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core").join("decisionLog.md");
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        append_decision(&path, "Adopt tracing", "Structured logs everywhere.", date).unwrap();
        append_decision(&path, "Second", "More.", date).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Decision Log\n"));
        let decisions = parse_decision_log(&text);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].title, "Adopt tracing");
        assert_eq!(decisions[0].body, "Structured logs everywhere.");
    }
}
