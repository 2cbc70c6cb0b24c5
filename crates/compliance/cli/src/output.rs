//! Output formatting utilities

use crate::error::CliResult;
use colored::*;
use compliance_engine::{RunResult, RunStatus};
use serde::Serialize;

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(data: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a section header
pub fn print_header(title: &str) {
    println!("\n{}", title.bold());
}

/// One-line summary of a run result
pub fn print_run_status(workflow: &str, result: &RunResult) {
    match result.status() {
        RunStatus::Completed => print_success(&format!("{} completed", workflow)),
        RunStatus::GateFailed => {
            let reason = result
                .data
                .as_ref()
                .and_then(|d| d.gate())
                .map(|g| g.message.clone())
                .unwrap_or_default();
            print_warning(&format!("{} stopped at a gate: {}", workflow, reason));
        }
        _ => {
            let message = result
                .error
                .as_ref()
                .map(|e| format!("{:?}: {}", e.error_kind, e.message))
                .unwrap_or_default();
            print_error(&format!("{} failed: {}", workflow, message));
        }
    }
}
