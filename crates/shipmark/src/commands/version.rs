//! Version command — show, bump, set and check the version in every
//! configured file.

use anyhow::{Context, bail};
use camino::Utf8Path;
use clap::{Args, Subcommand};
use inquire::Select;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipmark_core::config::Config;
use shipmark_core::files::{HandlerRegistry, ReadResult, WriteResult};
use shipmark_core::git;
use shipmark_core::release;
use shipmark_core::version::{self, BumpOption, BumpType, Channel, Version};

use super::{print_json, print_write_results, version_error};

/// Arguments for the `version` subcommand.
#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Action to run (defaults to `show`)
    #[command(subcommand)]
    pub command: Option<VersionCommand>,
}

/// Version actions.
#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Show the current version of every configured file
    Show,

    /// Bump the version in every configured file
    Bump(BumpArgs),

    /// Set an exact version in every configured file
    Set(SetArgs),

    /// Fail when configured files disagree on the version
    Check,
}

/// Arguments for `version bump`.
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// Bump type (prompted for when omitted)
    #[arg(value_enum)]
    pub kind: Option<BumpType>,

    /// Prerelease channel for pre* bumps
    #[arg(short, long, value_enum, default_value_t)]
    pub preid: Channel,

    /// Preview changes without writing files
    #[arg(short, long)]
    pub dry_run: bool,
}

/// Arguments for `version set`.
#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// New version (e.g., "1.2.3" or "v1.2.3")
    pub version: String,

    /// Preview changes without writing files
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct ShowReport<'a> {
    version: Option<&'a str>,
    files: &'a [ReadResult],
    latest_tag: Option<String>,
    commits_since_tag: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChangeReport {
    previous: Option<String>,
    version: String,
    dry_run: bool,
    files: Vec<WriteResult>,
}

/// Execute the version command.
#[instrument(name = "cmd_version", skip_all, fields(json_output))]
pub fn cmd_version(
    args: VersionArgs,
    global_json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing version command");

    match args.command.unwrap_or(VersionCommand::Show) {
        VersionCommand::Show => show(global_json, config, registry, cwd),
        VersionCommand::Bump(args) => bump(args, global_json, config, registry, cwd),
        VersionCommand::Set(args) => set(args, global_json, config, registry, cwd),
        VersionCommand::Check => check(global_json, config, registry, cwd),
    }
}

fn show(
    json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let readout = registry.read_version_from_files(cwd, &config.version.files);
    let (latest_tag, commits_since_tag) = if git::is_inside_repo(cwd)? {
        let tag = git::latest_tag(cwd)?;
        let count = git::commits_since(cwd, tag.as_deref())?;
        (tag, Some(count))
    } else {
        (None, None)
    };

    if json {
        return print_json(&ShowReport {
            version: readout.primary.as_deref(),
            files: &readout.results,
            latest_tag,
            commits_since_tag,
        });
    }

    match &readout.primary {
        Some(v) => println!("{}: {}", "Version".bold(), v.green().bold()),
        None => println!("{}: {}", "Version".bold(), "not found".yellow()),
    }
    for result in &readout.results {
        match (&result.version, &result.error) {
            (Some(v), _) => println!("  {} {} {}", "→".dimmed(), result.path.cyan(), v),
            (None, Some(err)) => println!("  {} {} {}", "✗".red(), result.path.cyan(), err.red()),
            (None, None) => println!(
                "  {} {} {}",
                "○".yellow(),
                result.path.cyan(),
                "no version".dimmed()
            ),
        }
    }
    if let Some(tag) = latest_tag {
        println!("{}: {}", "Latest tag".dimmed(), tag.cyan());
    }
    if let Some(count) = commits_since_tag {
        println!("{}: {}", "Commits since tag".dimmed(), count);
    }
    Ok(())
}

fn bump(
    args: BumpArgs,
    json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let current = release::current_version(cwd, config, registry)
        .context("failed to determine current version")?;

    let next = match args.kind {
        Some(kind) => current.version.bump(kind, args.preid).map_err(version_error)?,
        None if json => bail!("a bump type is required with --json"),
        None => {
            println!("{}: {}", "Current version".dimmed(), current.version);
            let choice = prompt_bump(version::bump_options(&current.version, args.preid))?;
            Version::parse(&choice.version).map_err(version_error)?
        }
    };

    apply(
        Some(current.version.to_string()),
        &next.to_string(),
        args.dry_run,
        json,
        config,
        registry,
        cwd,
    )
}

fn set(
    args: SetArgs,
    json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let next = Version::parse(version::clean(&args.version)).map_err(version_error)?;
    let previous = registry.read_version_from_files(cwd, &config.version.files).primary;
    apply(
        previous,
        &next.to_string(),
        args.dry_run,
        json,
        config,
        registry,
        cwd,
    )
}

fn apply(
    previous: Option<String>,
    next: &str,
    dry_run: bool,
    json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    if dry_run {
        if json {
            return print_json(&ChangeReport {
                previous,
                version: next.to_string(),
                dry_run,
                files: Vec::new(),
            });
        }
        println!(
            "{}: {} → {}",
            "Version".bold(),
            previous.as_deref().unwrap_or("none").dimmed(),
            next.green().bold()
        );
        for entry in &config.version.files {
            println!("  {} {}", "→".dimmed(), entry.normalize().path.cyan());
        }
        println!();
        println!("{}", "Dry run — no changes made.".yellow());
        return Ok(());
    }

    let files = registry.write_version_to_files(cwd, &config.version.files, next);
    let written = files.iter().filter(|r| r.success).count();

    if json {
        print_json(&ChangeReport {
            previous,
            version: next.to_string(),
            dry_run,
            files,
        })?;
    } else {
        println!(
            "{}: {} → {}",
            "Version".bold(),
            previous.as_deref().unwrap_or("none").dimmed(),
            next.green().bold()
        );
        print_write_results(&files);
    }

    if written == 0 {
        bail!("no version file was updated");
    }
    Ok(())
}

fn check(
    json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let report = registry.validate_version_sync(cwd, &config.version.files);

    if json {
        print_json(&report)?;
    } else {
        for (path, v) in &report.versions {
            let mark = if report.mismatches.contains(path) {
                "✗".red().to_string()
            } else {
                "✓".green().to_string()
            };
            println!("  {mark} {} {v}", path.cyan());
        }
        if report.synced {
            println!("{}", "All versions in sync.".green());
        }
    }

    if !report.synced {
        bail!("version mismatch in: {}", report.mismatches.join(", "));
    }
    Ok(())
}

/// Prompt the user to pick one of the bump options.
fn prompt_bump(options: Vec<BumpOption>) -> anyhow::Result<BumpOption> {
    if options.is_empty() {
        bail!("no version candidates available");
    }
    Select::new("Select version bump:", options)
        .prompt()
        .context("version selection cancelled")
}
