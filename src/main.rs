//! sitedist - asset build pipeline for static sites.

mod asset;
mod cli;
mod config;
mod html;
mod logger;
mod pipeline;
mod utils;
mod watch;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{AssetCategory, PipelineConfig};
use pipeline::Pipeline;
use watch::WatchRegistration;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Arc::new(PipelineConfig::load(&cli)?);
    let command = cli.command.unwrap_or(Commands::Build);

    if let Some(category) = command.category() {
        return run_single(config, category);
    }
    match command {
        Commands::Watch { no_build } => watch(config, no_build),
        _ => build(config),
    }
}

/// Exit status for a run whose stages all completed.
fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Commands
// =============================================================================

fn build(config: Arc<PipelineConfig>) -> Result<ExitCode> {
    let summary = Pipeline::new(config).run_full_build()?;
    Ok(exit_code(summary.is_clean()))
}

fn run_single(config: Arc<PipelineConfig>, category: AssetCategory) -> Result<ExitCode> {
    let report = Pipeline::new(config).run_task(category)?;
    log!("build"; "{}", report.summary());
    Ok(exit_code(report.is_clean()))
}

fn watch(config: Arc<PipelineConfig>, no_build: bool) -> Result<ExitCode> {
    // Register first so changes made during the initial build are not lost
    let registration = WatchRegistration::register(Arc::clone(&config))?;

    let mut pipeline = Pipeline::new(config);
    if !no_build {
        pipeline.run_full_build()?;
    }

    let shutdown = watch::setup_shutdown_handler()?;
    watch::run_dispatcher(&pipeline, &registration, &shutdown);
    Ok(ExitCode::SUCCESS)
}
