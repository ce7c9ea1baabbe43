//! Core types for the membank developer-workflow toolkit.
//!
//! This crate defines the records, configuration structs and error type shared
//! by the memory, tracker, kernel, API and CLI crates. It contains no business
//! logic.

pub mod cache;
pub mod config;
pub mod error;
pub mod feedback;
pub mod knowledge;
pub mod monitoring;
pub mod review;
pub mod task;
