// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use imagecfg::{apply, compile, path::blueprint_path, Blueprint, Script};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{io::stderr, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "imagecfg [options] <command> [blueprint]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Bash(opts) => run_bash(opts),
            Command::Apply(opts) => run_apply(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Translate blueprint into a bash script.
    #[command(override_usage = "imagecfg bash [blueprint]")]
    Bash(BlueprintOptions),

    /// Apply blueprint to running system block by block.
    #[command(override_usage = "imagecfg apply [blueprint]")]
    Apply(BlueprintOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BlueprintOptions {
    /// Path to blueprint, defaults to $IMAGECFG_BLUEPRINT or
    /// /usr/lib/bootc-image-builder/config.toml.
    #[arg(value_name = "blueprint")]
    pub blueprint: Option<PathBuf>,
}

fn main() {
    // INVARIANT: Logs go to stderr, stdout is reserved for generated scripts.
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_and_compile(opts: BlueprintOptions) -> Result<Script> {
    let path = blueprint_path(opts.blueprint);
    let blueprint = Blueprint::load(&path)
        .with_context(|| format!("failed to load blueprint {:?}", path.display()))?;

    for section in blueprint.unsupported_customizations() {
        warn!("customization {section:?} is not supported, skipping");
    }

    Ok(compile(&blueprint)?)
}

fn run_bash(opts: BlueprintOptions) -> Result<()> {
    let script = load_and_compile(opts)?;
    print!("{script}");

    Ok(())
}

fn run_apply(opts: BlueprintOptions) -> Result<()> {
    let script = load_and_compile(opts)?;
    let report = apply(&script)?;
    if !report.is_noop() {
        info!("applied {} blocks: {}", report.applied.len(), report.applied.join(", "));
    }

    Ok(())
}
