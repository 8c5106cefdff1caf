//! Command implementations

pub mod changelog;

pub mod history;

pub mod init;

pub mod release;

pub mod status;

pub mod tag;

pub mod version;

use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use shipmark_core::files::WriteResult;
use shipmark_core::version::VersionError;

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Start a spinner on stderr; hidden in JSON mode.
pub fn spinner(message: impl Into<String>, json: bool) -> ProgressBar {
    if json {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Ask a yes/no question.
pub fn confirm(question: &str, default: bool) -> anyhow::Result<bool> {
    Confirm::new(question)
        .with_default(default)
        .prompt()
        .context("confirmation cancelled")
}

/// Attach the remediation hints of a version error.
pub fn version_error(err: VersionError) -> anyhow::Error {
    let hints = err
        .suggestions()
        .iter()
        .map(|hint| format!("\n  hint: {hint}"))
        .collect::<String>();
    anyhow::anyhow!("{err}{hints}")
}

/// Print per-file write results.
pub fn print_write_results(results: &[WriteResult]) {
    for result in results {
        if result.success {
            println!(
                "  {} {} {}",
                "✓".green(),
                result.path.cyan(),
                format!("({})", result.handler).dimmed()
            );
        } else {
            println!(
                "  {} {} {}",
                "✗".red(),
                result.path.cyan(),
                result.error.as_deref().unwrap_or("write failed").red()
            );
        }
    }
}
