//! chtl-live - watch, build and live reload for CHTL projects.

mod build;
mod cli;
mod config;
mod core;
mod live;
mod logger;
mod module;
mod preview;
mod utils;
mod watch;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = ProjectConfig::load(&cli)?;

    let ok = match &cli.command {
        Commands::Serve { no_watch, .. } => {
            runtime()?.block_on(cli::serve::serve(&config, !no_watch))?;
            true
        }
        Commands::Build { paths } => runtime()?.block_on(cli::build::build_paths(&config, paths))?,
        Commands::Modules { args } => cli::modules::run_modules(&config, args)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}
