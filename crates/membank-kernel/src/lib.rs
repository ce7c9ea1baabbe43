//! Membank kernel: loads configuration, finds the workspace root and wires
//! the memory bank and trackers into a single [`Membank`] context.

pub mod config;
pub mod error;
pub mod kernel;

pub use kernel::Membank;
