//! Clap CLI definitions for membank.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1mHint:\x1b[0m Every command takes `--help`.

\x1b[1;36mExamples:\x1b[0m
  membank memory consult \"sqlite locking\"   Consult the memory bank
  membank task add \"Write docs\" --priority high
  membank task next                        Next task with all dependencies done
  membank feedback submit 8 --comment \"fast\"
  membank improve due --run                Run every review that is due
  membank monitor dashboard                Health, latency and recent alerts
  membank serve                            Start the HTTP API";

/// membank: project memory bank, task tracker and improvement loop.
#[derive(Parser)]
#[command(name = "membank", version, about, after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace root (default: located from the current directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tasks in .taskmaster/tasks/tasks.json.
    #[command(subcommand)]
    Task(TaskCommands),
    /// Record feedback, issues and surveys.
    #[command(subcommand)]
    Feedback(FeedbackCommands),
    /// Improvement reviews, their schedule and action items.
    #[command(subcommand)]
    Improve(ImproveCommands),
    /// Response-time monitoring and alerts.
    #[command(subcommand)]
    Monitor(MonitorCommands),
    /// Consult and maintain the memory bank.
    #[command(subcommand)]
    Memory(MemoryCommands),
    /// Inspect and prune result caches.
    #[command(subcommand)]
    Cache(CacheCommands),
    /// Start the HTTP API server.
    Serve,
    /// Generate shell completion scripts.
    Completion {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task.
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// high, medium or low.
        #[arg(long)]
        priority: Option<String>,
        /// Comma-separated ids this task depends on.
        #[arg(long, value_delimiter = ',')]
        depends: Vec<u64>,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        test_strategy: Option<String>,
    },
    /// List tasks.
    List {
        /// Only tasks with this status.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show one task.
    Show {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Change task fields.
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        test_strategy: Option<String>,
    },
    /// Set a task's status.
    Status { id: u64, status: String },
    /// Delete a task.
    Delete { id: u64 },
    /// Show the next task to work on.
    Next {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum FeedbackCommands {
    /// Submit a 1-10 rating.
    Submit {
        rating: u8,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Report an issue.
    Issue {
        title: String,
        /// critical, high, medium or low.
        #[arg(long, default_value = "medium")]
        severity: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        component: Option<String>,
    },
    /// Change an issue's status.
    IssueStatus { id: String, status: String },
    /// Submit survey answers as `question=score` (1-5).
    Survey {
        #[arg(required = true)]
        answers: Vec<String>,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Aggregate feedback figures.
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown report under feedback/reports/.
    Report,
}

#[derive(Subcommand)]
pub enum ImproveCommands {
    /// Schedule, last review and action counts.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Run a review now (weekly, monthly or quarterly).
    Review {
        kind: String,
        #[arg(long)]
        json: bool,
    },
    /// List reviews that are due.
    Due {
        /// Run them as well.
        #[arg(long)]
        run: bool,
    },
    /// Show or change the review schedule.
    #[command(subcommand)]
    Schedule(ScheduleCommands),
    /// Action items produced by reviews.
    #[command(subcommand)]
    Actions(ActionCommands),
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    Show,
    Enable { kind: String },
    Disable { kind: String },
}

#[derive(Subcommand)]
pub enum ActionCommands {
    List {
        #[arg(long)]
        json: bool,
    },
    Pending,
    Complete { id: String },
}

#[derive(Subcommand)]
pub enum MonitorCommands {
    /// Performance summary.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Record one operation sample.
    Record {
        operation: String,
        duration_ms: u64,
        /// The operation failed.
        #[arg(long)]
        failed: bool,
    },
    /// Recent alerts, newest first.
    Alerts {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Acknowledge an alert.
    Ack { id: String },
    /// Health, summary and recent alerts.
    Dashboard {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Consult the memory bank about a topic.
    Consult {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Hybrid search over memory documents.
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the knowledge graph from memory documents.
    Extract,
    /// List or search knowledge graph entities.
    Entities {
        /// Fuzzy name match instead of the most-mentioned list.
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Append a decision to the decision log.
    Decide {
        title: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    /// List or match library patterns.
    Patterns {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Add or replace a library pattern.
    Learn {
        id: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        #[arg(long, default_value = "")]
        solution: String,
    },
    /// Record one use of a pattern.
    UsePattern {
        id: String,
        #[arg(long)]
        failed: bool,
    },
    /// Merge near-duplicate patterns and count stale caches.
    Consolidate {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Fresh, stale and invalid entries per cache.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete expired entries.
    Prune,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_commands() {
        let cli = Cli::try_parse_from([
            "membank", "--root", "/tmp/ws", "task", "add", "Ship", "--depends", "1,2",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/ws")));
        match cli.command {
            Commands::Task(TaskCommands::Add { title, depends, .. }) => {
                assert_eq!(title, "Ship");
                assert_eq!(depends, vec![1, 2]);
            }
            _ => panic!("expected task add"),
        }

        let cli = Cli::try_parse_from(["membank", "improve", "schedule", "enable", "weekly"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Improve(ImproveCommands::Schedule(ScheduleCommands::Enable { .. }))
        ));
    }
}
