//! Changelog command — render commits in a range into the changelog file.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipmark_core::changelog;
use shipmark_core::commits;
use shipmark_core::config::Config;
use shipmark_core::files::HandlerRegistry;
use shipmark_core::git;

const UNRELEASED: &str = "Unreleased";

/// Arguments for the `changelog` subcommand.
#[derive(Args, Debug, Default)]
pub struct ChangelogArgs {
    /// Starting tag or commit (default: latest tag)
    #[arg(short, long, value_name = "REF")]
    pub from: Option<String>,

    /// Ending ref (default: HEAD)
    #[arg(short, long, value_name = "REF")]
    pub to: Option<String>,

    /// Output file (default: the configured changelog file)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Print the grouped commits without writing
    #[arg(short, long)]
    pub preview: bool,

    /// Version for the entry header (default: current version, else "Unreleased")
    #[arg(long, value_name = "VERSION")]
    pub release_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangelogReport {
    version: String,
    from: Option<String>,
    to: String,
    commits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<Utf8PathBuf>,
    entry: String,
}

/// Execute the changelog command.
#[instrument(name = "cmd_changelog", skip_all, fields(json_output))]
pub fn cmd_changelog(
    args: ChangelogArgs,
    global_json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, ?args, "executing changelog command");
    git::ensure_repo(cwd).context("changelog needs a git repository")?;

    let from = match args.from {
        Some(from) => Some(from),
        None => git::latest_tag(cwd)?,
    };
    let to = args.to.unwrap_or_else(|| "HEAD".to_string());

    let spinner = super::spinner("Fetching commits...", global_json);
    let raw = git::parse_log_output(&git::log(cwd, from.as_deref(), &to)?);
    let parsed = commits::parse_commits_with(raw, &config.commits);
    spinner.finish_and_clear();

    if parsed.is_empty() {
        if global_json {
            return super::print_json(&serde_json::json!({ "commits": 0 }));
        }
        println!("{}", "No commits found in range.".yellow());
        return Ok(());
    }

    let version = args
        .release_version
        .or_else(|| {
            registry
                .read_version_from_files(cwd, &config.version.files)
                .primary
        })
        .unwrap_or_else(|| UNRELEASED.to_string());

    if args.preview && !global_json {
        println!("{} {}", "Changelog preview -".bold(), version.cyan());
        for line in changelog::preview(&parsed, &config.changelog.labels()) {
            println!("  {line}");
        }
        return Ok(());
    }

    let repo_url = git::remote_url(cwd)?.map(|url| changelog::normalize_repo_url(&url));
    let entry = changelog::render_entry(
        &version,
        &changelog::today(),
        &parsed,
        &config.changelog,
        repo_url.as_deref(),
    );

    let written = if args.preview {
        None
    } else {
        let file = args
            .output
            .as_ref()
            .map_or(config.changelog.file.as_str(), |p| p.as_str());
        Some(
            changelog::write_entry(cwd, file, &entry, &version)
                .context("failed to write changelog")?,
        )
    };

    if global_json {
        return super::print_json(&ChangelogReport {
            version,
            from,
            to,
            commits: parsed.len(),
            written,
            entry,
        });
    }

    if let Some(path) = &written {
        println!(
            "{} Changelog written to {} ({} commits)",
            "✓".green(),
            path.cyan(),
            parsed.len()
        );
    }
    let labels = config.changelog.labels();
    for (kind, count) in commits::count_by_type(&parsed) {
        println!(
            "  {}: {count}",
            commits::group_title(&kind, &labels).dimmed()
        );
    }
    let breaking = parsed.iter().filter(|c| c.breaking).count();
    if breaking > 0 {
        println!("  {}: {breaking}", "Breaking changes".red());
    }
    Ok(())
}
