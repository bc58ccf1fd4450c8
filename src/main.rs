// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v selects debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Cook {
            recipe,
            target,
            output,
            source_cache,
            jobs,
            keep_builddir,
            offline,
        } => commands::cmd_cook(commands::CookArgs {
            recipe_path: &recipe,
            target: &target,
            output: output.as_deref(),
            source_cache: source_cache.as_deref(),
            jobs,
            keep_builddir,
            offline,
            config_path: config,
        }),
        Commands::Resolve { recipe, target } => commands::cmd_resolve(&recipe, &target),
        Commands::Validate { recipe } => commands::cmd_validate(&recipe),
        Commands::Fetch {
            recipe,
            version,
            source_cache,
        } => commands::cmd_fetch(&recipe, version.as_deref(), source_cache.as_deref(), config),
        Commands::Order { dir } => commands::cmd_order(&dir),
    }
}
