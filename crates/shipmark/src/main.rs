//! shipmark CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use shipmark::{Cli, Commands, commands};
use shipmark_core::config::ConfigLoader;
use shipmark_core::files::HandlerRegistry;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config =
        observability::ObservabilityConfig::from_env_with_overrides(config.log_dir.clone());
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let registry = HandlerRegistry::with_builtins();
    let result = match cli.command {
        Commands::Version(args) => {
            commands::version::cmd_version(args, cli.json, &config, &registry, &cwd)
        }
        Commands::Status(args) => commands::status::cmd_status(
            args,
            cli.verbose > 0,
            cli.json,
            &config,
            &registry,
            &cwd,
        ),
        Commands::Changelog(args) => {
            commands::changelog::cmd_changelog(args, cli.json, &config, &registry, &cwd)
        }
        Commands::Tag(args) => commands::tag::cmd_tag(args, cli.json, &config, &cwd),
        Commands::History(args) => commands::history::cmd_history(args, cli.json, &config, &cwd),
        Commands::Release(args) => {
            commands::release::cmd_release(args, cli.json, &config, &registry, &cwd)
        }
        Commands::Init(args) => commands::init::cmd_init(args, cli.json, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
