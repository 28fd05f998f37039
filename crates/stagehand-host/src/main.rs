//! `stagehand`: runs the stock modules until Ctrl+C.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use stagehand_config::HostConfig;
use stagehand_host::{Host, builtin_modules, default_app_root};
use stagehand_telemetry::{LogConfig, setup_logging};

/// Stagehand host: loads modules and unloads them on quit.
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(author, version, about = "Stagehand host: loads modules and unloads them on quit")]
struct Args {
    /// Application root. Defaults to the per-user data directory.
    #[arg(long, env = "STAGEHAND_ROOT")]
    root: Option<PathBuf>,

    /// Configuration file. Defaults to `<root>/config.toml` when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root = args
        .root
        .or_else(default_app_root)
        .context("no application root given and no home directory found")?;
    let resolved = HostConfig::load(&root, args.config.as_deref())
        .with_context(|| format!("failed to load configuration under {}", root.display()))?;

    let mut log_config = LogConfig::from_section(&resolved.config.logging)?;
    if args.verbose {
        log_config.level = "debug".to_owned();
    }
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let host = Host::new(&root, &resolved);
    let loaded = host.load_all(builtin_modules()?).await?;

    println!(
        "{}",
        format!("stagehand running in {}", root.display()).cyan().bold()
    );
    for key in &loaded {
        println!("  {} {key}", "loaded".green());
    }
    for file in &resolved.loaded_files {
        println!("  {} {}", "config".dimmed(), file.display());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    println!("\n{}", "Unloading modules...".yellow());
    let unloaded = host.quit().await;
    println!("{}", format!("Stopped, {unloaded} modules unloaded.").green());

    Ok(())
}
