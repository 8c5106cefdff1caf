//! Status command — where the repository stands relative to its last
//! release.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipmark_core::commits::{self, ParsedCommit};
use shipmark_core::config::Config;
use shipmark_core::files::HandlerRegistry;
use shipmark_core::git;
use shipmark_core::provider::Provider;
use shipmark_core::release;
use shipmark_core::version::{BumpType, Channel};

/// Arguments for the `status` subcommand.
///
/// The global `-v` flag adds the pending commit list.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
struct TypeCount {
    #[serde(rename = "type")]
    kind: String,
    label: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    branch: Option<String>,
    version: Option<String>,
    latest_tag: Option<String>,
    remote: Option<String>,
    provider: Option<Provider>,
    clean: bool,
    pending: usize,
    breaking: usize,
    by_type: Vec<TypeCount>,
    suggested_bump: Option<BumpType>,
    suggested_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    commits: Vec<ParsedCommit>,
}

/// Execute the status command.
#[instrument(name = "cmd_status", skip_all, fields(json_output))]
pub fn cmd_status(
    _args: StatusArgs,
    detailed: bool,
    global_json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, detailed, "executing status command");
    git::ensure_repo(cwd).context("status needs a git repository")?;

    let version = registry
        .read_version_from_files(cwd, &config.version.files)
        .primary;
    let latest_tag = git::latest_tag(cwd)?;
    let remote = git::remote_url(cwd)?;

    let pending = if git::has_commits(cwd)? {
        let raw = git::parse_log_output(&git::log(cwd, latest_tag.as_deref(), "HEAD")?);
        commits::parse_commits_with(raw, &config.commits)
    } else {
        Vec::new()
    };

    let labels = config.changelog.labels();
    let by_type = commits::count_by_type(&pending)
        .into_iter()
        .map(|(kind, count)| TypeCount {
            label: commits::group_title(&kind, &labels).to_string(),
            kind,
            count,
        })
        .collect();

    let (suggested_bump, suggested_version) = if pending.is_empty() {
        (None, None)
    } else {
        let kind = commits::suggest_bump(&pending);
        let next = release::current_version(cwd, config, registry)
            .ok()
            .and_then(|current| current.version.bump(kind, Channel::default()).ok())
            .map(|next| next.to_string());
        (Some(kind), next)
    };

    let report = StatusReport {
        branch: git::current_branch(cwd)?,
        version,
        latest_tag,
        provider: remote.as_deref().map(Provider::detect),
        remote,
        clean: git::is_clean(cwd)?,
        pending: pending.len(),
        breaking: pending.iter().filter(|c| c.breaking).count(),
        by_type,
        suggested_bump,
        suggested_version,
        commits: if detailed { pending } else { Vec::new() },
    };

    if global_json {
        return super::print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &StatusReport) {
    println!("{}", "Release Status".bold().underline());
    println!(
        "  {}: {}",
        "Branch".dimmed(),
        report
            .branch
            .as_deref()
            .map_or_else(|| "detached".yellow().to_string(), |b| b.cyan().to_string())
    );
    println!(
        "  {}: {}",
        "Version".dimmed(),
        report
            .version
            .as_deref()
            .map_or_else(|| "not set".yellow().to_string(), |v| v.cyan().to_string())
    );
    println!(
        "  {}: {}",
        "Latest tag".dimmed(),
        report
            .latest_tag
            .as_deref()
            .map_or_else(|| "no tags".yellow().to_string(), |t| t.cyan().to_string())
    );
    match (&report.remote, report.provider) {
        (Some(url), Some(provider)) => {
            println!("  {}: {} ({provider})", "Remote".dimmed(), url.cyan());
        }
        _ => println!("  {}: {}", "Remote".dimmed(), "not configured".yellow()),
    }
    println!(
        "  {}: {}",
        "Working tree".dimmed(),
        if report.clean {
            "clean".green().to_string()
        } else {
            "uncommitted changes".yellow().to_string()
        }
    );
    println!();

    if report.pending == 0 {
        println!("{} No changes since last release", "✓".green());
        return;
    }

    println!(
        "{} ({})",
        "Pending changes".bold().underline(),
        report.pending
    );
    for entry in &report.by_type {
        println!("  {}: {}", entry.label.dimmed(), entry.count);
    }
    if report.breaking > 0 {
        println!("  {}: {}", "Breaking changes".red(), report.breaking);
    }

    if !report.commits.is_empty() {
        println!();
        for commit in &report.commits {
            let marker = if commit.breaking { "!" } else { " " };
            println!(
                "  {} {}{marker} {}",
                commit.short_hash.dimmed(),
                commit.kind.cyan(),
                commit.subject
            );
        }
    }

    if let (Some(kind), Some(next)) = (report.suggested_bump, &report.suggested_version) {
        println!();
        println!(
            "{}: {} ({kind})",
            "Suggested next version".bold(),
            next.green().bold()
        );
    }
}
