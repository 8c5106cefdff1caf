//! Release command — thin CLI layer over `shipmark_core::release`.

use anyhow::{Context, bail};
use camino::Utf8Path;
use clap::Args;
use inquire::{Select, Text};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipmark_core::changelog;
use shipmark_core::config::Config;
use shipmark_core::files::HandlerRegistry;
use shipmark_core::release::{
    self, ExecuteOptions, InteractiveRelease, ReadyRelease, ReleaseOptions, ReleasePlan,
};
use shipmark_core::version::{self, BumpType, Channel, Version};

use super::{confirm, print_json, print_write_results, spinner, version_error};

const CUSTOM_CHOICE: &str = "custom…";

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// Preview the release without changing anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// Do not regenerate the changelog
    #[arg(long)]
    pub skip_changelog: bool,

    /// Do not create a tag
    #[arg(long)]
    pub skip_tag: bool,

    /// Do not push to the remote
    #[arg(long)]
    pub skip_push: bool,

    /// Prerelease channel for pre* bumps
    #[arg(short, long, value_enum, default_value_t)]
    pub preid: Channel,

    /// Bump type (prompted for when omitted)
    #[arg(short, long, value_enum)]
    pub bump: Option<BumpType>,

    /// Release this exact version
    #[arg(long, value_name = "VERSION", conflicts_with = "bump")]
    pub release_version: Option<String>,

    /// Create a GitHub/GitLab release with the provider CLI
    #[arg(long)]
    pub provider_release: bool,

    /// Skip confirmation prompts (uses the suggested bump when none is given)
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
struct DryRunReport<'a> {
    dry_run: bool,
    plan: &'a ReadyRelease,
    changelog: bool,
    tag: bool,
    push: bool,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all, fields(json_output))]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    registry: &HandlerRegistry,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, ?args, "executing release command");
    let interactive = !args.yes && !global_json;

    let options = ReleaseOptions {
        explicit_version: args.release_version.clone(),
        bump: args.bump,
        channel: args.preid,
    };
    let plan = release::plan_release(cwd, config, registry, &options)
        .context("release planning failed")?;

    let context = match &plan {
        ReleasePlan::Ready(ready) => &ready.context,
        ReleasePlan::NeedsInteraction(pending) => &pending.context,
    };
    if context.commits.is_empty()
        && interactive
        && !confirm("No commits since last release. Continue anyway?", false)?
    {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }
    if !global_json {
        print_preview(context, config);
    }

    let ready = match plan {
        ReleasePlan::Ready(ready) => ready,
        ReleasePlan::NeedsInteraction(pending) if !interactive => {
            let chosen = pending.suggested_version().map_err(version_error)?;
            release::resolve_interactive(pending, chosen, config)
        }
        ReleasePlan::NeedsInteraction(pending) => {
            let chosen = prompt_version(&pending).context("version selection failed")?;
            release::resolve_interactive(pending, chosen, config)
        }
    };

    let steps = ExecuteOptions {
        changelog: !args.skip_changelog,
        tag: !args.skip_tag,
        push: !args.skip_push,
        provider_release: args.provider_release,
    };

    if global_json && args.dry_run {
        return print_json(&DryRunReport {
            dry_run: true,
            plan: &ready,
            changelog: steps.changelog,
            tag: steps.tag,
            push: steps.push,
        });
    }
    if !global_json {
        print_summary(&ready, steps, config);
    }
    if args.dry_run {
        println!();
        println!("{}", "Dry run — no changes made.".yellow());
        return Ok(());
    }
    if interactive && !confirm("Proceed with release?", true)? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    let progress = spinner(format!("Releasing {}...", ready.next), global_json);
    let result = ready.execute(cwd, config, registry, steps);
    progress.finish_and_clear();
    let outcome = result.context("release failed")?;

    if global_json {
        return print_json(&outcome);
    }

    println!();
    print_write_results(&outcome.files);
    if let Some(path) = &outcome.changelog {
        println!("  {} Changelog updated: {}", "✓".green(), path.cyan());
    }
    if outcome.committed {
        println!(
            "  {} Committed: {}",
            "✓".green(),
            config.version.commit_message_for(&outcome.version.to_string())
        );
    }
    if let Some(tag) = &outcome.tag {
        println!("  {} Tagged: {}", "✓".green(), tag.cyan());
    }
    if outcome.pushed {
        println!("  {} Pushed to remote", "✓".green());
    }
    match &outcome.provider_release {
        Some(Ok(output)) => println!("  {} Hosted release created {}", "✓".green(), output.dimmed()),
        Some(Err(err)) => println!("  {} Hosted release skipped: {}", "○".yellow(), err),
        None => {}
    }
    println!();
    println!(
        "{} Released {}",
        "✓".green().bold(),
        outcome.version.to_string().green().bold()
    );
    Ok(())
}

fn print_preview(context: &release::ReleaseContext, config: &Config) {
    println!(
        "{}: {} {}",
        "Current version".dimmed(),
        context.current.version,
        format!("(from {:?})", context.current.source).to_lowercase().dimmed()
    );
    match &context.latest_tag {
        Some(tag) => println!("{}: {}", "Latest tag".dimmed(), tag.cyan()),
        None => println!("{}: {}", "Latest tag".dimmed(), "none".yellow()),
    }
    println!(
        "{}: {}",
        "Commits since tag".dimmed(),
        context.commits.len()
    );

    let lines = changelog::preview(&context.commits, &config.changelog.labels());
    if !lines.is_empty() {
        println!();
        println!("{}", "Changelog preview".bold().underline());
        for line in lines {
            println!("  {line}");
        }
    }
    println!();
}

fn print_summary(ready: &ReadyRelease, steps: ExecuteOptions, config: &Config) {
    let yes_no = |enabled: bool| {
        if enabled {
            "yes".green().to_string()
        } else {
            "skipped".yellow().to_string()
        }
    };
    println!("{}", "Release summary".bold().underline());
    println!(
        "  {}: {} → {}",
        "Version".dimmed(),
        ready.context.current.version.to_string().dimmed(),
        ready.next.to_string().green().bold()
    );
    println!("  {}: {}", "Tag".dimmed(), yes_no(steps.tag));
    if steps.tag {
        println!("  {}: {}", "Tag name".dimmed(), ready.tag.cyan());
    }
    println!("  {}: {}", "Changelog".dimmed(), yes_no(steps.changelog));
    println!(
        "  {}: {}",
        "Push".dimmed(),
        yes_no(steps.push && config.git.push)
    );
    for entry in &config.version.files {
        println!("  {} {}", "→".dimmed(), entry.normalize().path.cyan());
    }
}

/// Prompt for the next version: one of the bump options, or a custom one.
fn prompt_version(plan: &InteractiveRelease) -> anyhow::Result<Version> {
    let suggested = plan.context.suggested;
    let mut choices: Vec<String> = plan
        .context
        .options
        .iter()
        .map(|option| {
            if option.kind == suggested {
                format!("{option} (suggested)")
            } else {
                option.to_string()
            }
        })
        .collect();
    choices.push(CUSTOM_CHOICE.to_string());

    let start = plan
        .context
        .options
        .iter()
        .position(|option| option.kind == suggested)
        .unwrap_or(0);
    let choice = Select::new("Select release version:", choices)
        .with_starting_cursor(start)
        .prompt()
        .context("version selection cancelled")?;

    if choice == CUSTOM_CHOICE {
        let input = Text::new("Version:")
            .with_validator(|input: &str| {
                Ok(if version::is_valid(input) {
                    inquire::validator::Validation::Valid
                } else {
                    inquire::validator::Validation::Invalid(
                        "expected MAJOR.MINOR.PATCH, e.g. 1.2.3".into(),
                    )
                })
            })
            .prompt()
            .context("version input cancelled")?;
        return Version::parse(version::clean(&input)).map_err(version_error);
    }

    let Some(option) = plan
        .context
        .options
        .iter()
        .find(|option| choice.starts_with(&option.to_string()))
    else {
        bail!("unexpected selection: {choice}");
    };
    Version::parse(&option.version).map_err(version_error)
}
