//! History command: past releases read back from tags.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipmark_core::config::Config;
use shipmark_core::git::RawCommit;
use shipmark_core::release::{self, ReleaseRecord};

/// Commits listed per release before the rest is summarised.
const DETAIL_LIMIT: usize = 10;

/// Arguments for the `history` subcommand.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Number of releases to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// List the commits of each release
    #[arg(short, long)]
    pub details: bool,
}

#[derive(Debug, Serialize)]
struct ReleaseEntry<'a> {
    tag: &'a str,
    version: &'a str,
    date: Option<&'a str>,
    commit_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    commits: Option<&'a [RawCommit]>,
}

#[derive(Debug, Serialize)]
struct HistoryReport<'a> {
    total: usize,
    shown: usize,
    releases: Vec<ReleaseEntry<'a>>,
}

/// Execute the history command.
#[instrument(name = "cmd_history", skip_all, fields(json_output))]
pub fn cmd_history(
    args: HistoryArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, limit = args.limit, "executing history command");
    let records = release::history(cwd, config).context("failed to read release history")?;
    let shown = &records[..records.len().min(args.limit)];

    let report = HistoryReport {
        total: records.len(),
        shown: shown.len(),
        releases: shown
            .iter()
            .map(|record| ReleaseEntry {
                tag: &record.tag,
                version: &record.version,
                date: record.date.as_deref(),
                commit_count: record.commits.len(),
                commits: args.details.then_some(record.commits.as_slice()),
            })
            .collect(),
    };

    if global_json {
        return super::print_json(&report);
    }
    if records.is_empty() {
        println!("{} No releases found", "○".dimmed());
        return Ok(());
    }
    print_table(shown);
    print_footer(report.shown, report.total);
    if args.details {
        print_details(shown);
    }
    Ok(())
}

fn print_table(records: &[ReleaseRecord]) {
    println!("{}", "Release History".bold().underline());
    let width = records.iter().map(|r| r.tag.len()).max().unwrap_or(0);
    for record in records {
        let count = record.commits.len();
        println!(
            "  {}  {}  {}",
            format!("{:<width$}", record.tag).cyan(),
            record.date.as_deref().unwrap_or("unknown   ").dimmed(),
            format!("{count} commit{}", if count == 1 { "" } else { "s" })
        );
    }
}

fn print_footer(shown: usize, total: usize) {
    println!();
    if shown < total {
        println!(
            "{}",
            format!("Showing {shown} of {total} releases. Use --limit to see more.").dimmed()
        );
    } else {
        println!(
            "{}",
            format!("{total} release{} total", if total == 1 { "" } else { "s" }).dimmed()
        );
    }
}

fn print_details(records: &[ReleaseRecord]) {
    for record in records {
        println!();
        println!(
            "{} {}",
            record.tag.bold(),
            format!("({})", record.date.as_deref().unwrap_or("unknown")).dimmed()
        );
        if record.commits.is_empty() {
            println!("  {}", "No commits found".dimmed());
            continue;
        }
        for commit in record.commits.iter().take(DETAIL_LIMIT) {
            println!("  {} {}", "→".cyan(), commit.subject);
        }
        if record.commits.len() > DETAIL_LIMIT {
            println!(
                "  {}",
                format!("... and {} more", record.commits.len() - DETAIL_LIMIT).dimmed()
            );
        }
    }
}
