//! Shared terminal output helpers.

use colored::Colorize;
use membank_types::monitoring::HealthStatus;
use serde::Serialize;

/// Print a success message.
pub fn success(msg: &str) {
    println!("  {} {}", "\u{2714}".bright_green(), msg);
}

/// Print an error message to stderr.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "\u{2718}".bright_red(), msg.bright_red());
}

/// Red error + yellow "fix:" suggestion.
pub fn error_with_fix(msg: &str, fix: &str) {
    eprintln!("  {} {}", "\u{2718}".bright_red(), msg.bright_red());
    eprintln!("    {} {}", "fix:".bright_yellow(), fix);
}

/// Yellow warning line.
pub fn warn(msg: &str) {
    println!("  {} {}", "-".bright_yellow(), msg.yellow());
}

/// Section header: ">> Title" in cyan.
pub fn section(title: &str) {
    println!("  {} {}", ">>".bright_cyan().bold(), title.bold());
}

/// Key-value display: "  Label:         value".
pub fn kv(label: &str, value: &str) {
    println!("  {:<15}{}", format!("{label}:"), value);
}

/// Key-value with green value.
pub fn kv_ok(label: &str, value: &str) {
    println!("  {:<15}{}", format!("{label}:"), value.bright_green());
}

/// Key-value with yellow value.
pub fn kv_warn(label: &str, value: &str) {
    println!("  {:<15}{}", format!("{label}:"), value.bright_yellow());
}

/// Hint line in dimmed text.
pub fn hint(msg: &str) {
    println!("  {} {}", "hint:".dimmed(), msg.dimmed());
}

/// Bulleted line.
pub fn bullet(msg: &str) {
    println!("    {} {}", "\u{2022}".bright_cyan(), msg);
}

/// Empty line.
pub fn blank() {
    println!();
}

/// Pretty-printed JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// Health as a colored word.
pub fn health(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => status.to_string().bright_green().to_string(),
        HealthStatus::Degraded => status.to_string().bright_yellow().to_string(),
        HealthStatus::Critical => status.to_string().bright_red().to_string(),
    }
}
