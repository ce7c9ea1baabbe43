//! File-backed workflow trackers.
//!
//! - **Tasks**: CRUD over `.taskmaster/tasks/tasks.json`
//! - **Feedback**: ratings, issues and surveys with priority classification
//! - **Monitor**: response-time samples, alerts and a health dashboard
//! - **Improvement**: scheduled reviews that turn the above into action items
//!
//! Every tracker keeps its records in capped JSON arrays and re-reads the
//! file on each operation.

pub mod feedback;
pub mod improvement;
pub mod json_log;
pub mod monitor;
pub mod tasks;

pub use feedback::FeedbackTracker;
pub use improvement::ImprovementCycle;
pub use monitor::PerformanceMonitor;
pub use tasks::{JsonTaskStorage, TaskService, TaskStorage};
