//! Tag command — list, create, delete and inspect release tags.

use anyhow::{Context, bail};
use camino::Utf8Path;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipmark_core::config::Config;
use shipmark_core::git;
use shipmark_core::version::{self, Version};

use super::{confirm, print_json, version_error};

/// Arguments for the `tag` subcommand.
#[derive(Args, Debug)]
pub struct TagArgs {
    /// Tag action
    #[command(subcommand)]
    pub command: TagCommand,
}

/// Tag actions.
#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// List tags, newest version first
    List(ListArgs),

    /// Create a release tag for a version
    Create(CreateArgs),

    /// Delete a release tag
    Delete(DeleteArgs),

    /// Print the most recent tag
    Latest,
}

/// Arguments for `tag list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of tags to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}

/// Arguments for `tag create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Version to tag (the configured prefix is added)
    pub version: String,

    /// Tag message (default: the configured tag message)
    #[arg(short, long)]
    pub message: Option<String>,

    /// Sign the tag with GPG
    #[arg(short, long)]
    pub sign: bool,

    /// Push the tag to the remote
    #[arg(short, long)]
    pub push: bool,
}

/// Arguments for `tag delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Version whose tag should be deleted
    pub version: String,

    /// Also delete the tag from the remote
    #[arg(short, long)]
    pub remote: bool,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
struct TagReport {
    tag: String,
    created: bool,
    deleted: bool,
    pushed: bool,
}

/// Execute the tag command.
#[instrument(name = "cmd_tag", skip_all, fields(json_output))]
pub fn cmd_tag(
    args: TagArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing tag command");
    git::ensure_repo(cwd).context("tag needs a git repository")?;

    match args.command {
        TagCommand::List(args) => list(&args, global_json, cwd),
        TagCommand::Create(args) => create(args, global_json, config, cwd),
        TagCommand::Delete(args) => delete(&args, global_json, config, cwd),
        TagCommand::Latest => latest(global_json, cwd),
    }
}

fn list(args: &ListArgs, json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    let tags: Vec<String> = git::tags(cwd)?.into_iter().take(args.limit).collect();
    if json {
        return print_json(&tags);
    }
    if tags.is_empty() {
        println!("{}", "No tags found.".yellow());
    }
    for tag in &tags {
        println!("  {}", tag.cyan());
    }
    Ok(())
}

fn create(args: CreateArgs, json: bool, config: &Config, cwd: &Utf8Path) -> anyhow::Result<()> {
    let tag = tag_for(&args.version, config)?;
    if git::tag_exists(cwd, &tag)? {
        bail!("tag {tag} already exists");
    }

    let message = args.message.unwrap_or_else(|| {
        config
            .version
            .tag_message_for(version::clean(&args.version))
    });
    git::create_tag(cwd, &tag, &message, args.sign || config.git.sign_tags)
        .context("failed to create tag")?;

    let pushed = args.push && git::has_remote(cwd)?;
    if pushed {
        git::push(cwd, true).context("failed to push tag")?;
    }

    if json {
        return print_json(&TagReport {
            tag,
            created: true,
            deleted: false,
            pushed,
        });
    }
    println!("{} Created tag {}", "✓".green(), tag.green().bold());
    if pushed {
        println!("{} Pushed to remote", "✓".green());
    } else if args.push {
        println!("{}", "No remote configured; tag not pushed.".yellow());
    }
    Ok(())
}

fn delete(args: &DeleteArgs, json: bool, config: &Config, cwd: &Utf8Path) -> anyhow::Result<()> {
    let tag = tag_for(&args.version, config)?;
    if !git::tag_exists(cwd, &tag)? {
        bail!("tag {tag} does not exist");
    }

    if !args.yes && !json && !confirm(&format!("Delete tag {tag}?"), false)? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    git::delete_tag(cwd, &tag).context("failed to delete tag")?;
    let pushed = args.remote && git::has_remote(cwd)?;
    if pushed {
        git::delete_remote_tag(cwd, &tag).context("failed to delete remote tag")?;
    }

    if json {
        return print_json(&TagReport {
            tag,
            created: false,
            deleted: true,
            pushed,
        });
    }
    println!("{} Deleted tag {}", "✓".green(), tag.cyan());
    if pushed {
        println!("{} Deleted from remote", "✓".green());
    }
    Ok(())
}

fn latest(json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    let tag = git::latest_tag(cwd)?;
    if json {
        return print_json(&serde_json::json!({ "tag": tag }));
    }
    match tag {
        Some(tag) => println!("{tag}"),
        None => println!("{}", "No tags found.".yellow()),
    }
    Ok(())
}

/// Validate `input` and build its tag name.
fn tag_for(input: &str, config: &Config) -> anyhow::Result<String> {
    let parsed = Version::parse(version::clean(input)).map_err(version_error)?;
    Ok(config.version.tag_name(&parsed.to_string()))
}
