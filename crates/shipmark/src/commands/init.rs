//! Init command — write a default configuration file.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use shipmark_core::config;

/// Arguments for the `init` subcommand.
#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the init command.
#[instrument(name = "cmd_init", skip_all, fields(json_output))]
pub fn cmd_init(args: InitArgs, global_json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    debug!(json_output = global_json, force = args.force, "executing init command");

    let inherited = config::find_project_config(cwd).filter(|found| found.parent() != Some(cwd));
    let path = config::write_default_config(cwd, args.force)
        .context("failed to write configuration")?;

    if global_json {
        return super::print_json(&serde_json::json!({ "path": path }));
    }
    println!("{} Created {}", "✓".green(), path.cyan());
    if let Some(parent) = inherited {
        println!(
            "  {} {} now takes precedence over {}",
            "→".dimmed(),
            path,
            parent.dimmed()
        );
    }
    println!(
        "{}",
        "Edit version.files to list every manifest that carries the version.".dimmed()
    );
    Ok(())
}
