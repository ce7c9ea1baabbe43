//! Command implementations by domain.

pub mod cache;
pub mod feedback;
pub mod improve;
pub mod memory;
pub mod monitor;
pub mod serve;
pub mod task;

use crate::cli::Cli;
use clap::CommandFactory;
use membank_types::error::{MembankError, MembankResult};

pub fn cmd_completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "membank", &mut std::io::stdout());
}

/// Parse a `FromStr` argument, turning its message into an input error.
pub(crate) fn parse_arg<T>(value: &str) -> MembankResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(MembankError::InvalidInput)
}
