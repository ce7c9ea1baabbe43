//! membank CLI: the memory bank, task tracker and improvement loop from the
//! terminal.
//!
//! Every command boots an in-process [`Membank`] for the workspace; `serve`
//! keeps it alive behind the HTTP API.

mod cli;
mod cmd;
pub mod table;
mod ui;

use crate::cli::*;
use clap::Parser;
use membank_kernel::error::KernelError;
use membank_kernel::Membank;
use membank_types::config::MembankConfig;
use std::path::Path;

fn init_tracing_stderr(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn boot_error(e: &KernelError) {
    let msg = e.to_string();
    if msg.contains("database") || msg.contains("locked") || msg.contains("Storage") {
        ui::error_with_fix(
            "Storage error (database may be locked)",
            "Check whether another membank process is using memory/membank.db",
        );
    } else if msg.contains("root") {
        ui::error_with_fix(&msg, "Pass an existing directory with --root");
    } else {
        ui::error_with_fix(
            &format!("Failed to open the memory bank: {msg}"),
            "Check membank.toml and the workspace layout",
        );
    }
}

fn boot_membank(config: MembankConfig, root: &Path) -> Membank {
    match Membank::boot(config, root) {
        Ok(membank) => membank,
        Err(e) => {
            boot_error(&e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Completion { shell } = cli.command {
        cmd::cmd_completion(shell);
        return;
    }

    let (config, root) = match Membank::resolve(cli.config.as_deref(), cli.root.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            boot_error(&e);
            std::process::exit(1);
        }
    };
    init_tracing_stderr(&config.log_level);
    tracing::debug!(root = %root.display(), "Opening workspace");
    let membank = boot_membank(config, &root);

    let result = match cli.command {
        Commands::Task(sub) => cmd::task::run(&membank, sub),
        Commands::Feedback(sub) => cmd::feedback::run(&membank, sub),
        Commands::Improve(sub) => cmd::improve::run(&membank, sub),
        Commands::Monitor(sub) => cmd::monitor::run(&membank, sub),
        Commands::Memory(sub) => cmd::memory::run(&membank, sub),
        Commands::Cache(sub) => cmd::cache::run(&membank, sub),
        Commands::Serve => cmd::serve::run(membank),
        Commands::Completion { .. } => Ok(()),
    };

    if let Err(e) = result {
        ui::error(&e.to_string());
        std::process::exit(1);
    }
}
