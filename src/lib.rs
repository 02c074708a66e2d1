// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod livereload;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_or_default, write_default_config, ConfigFile};
use crate::engine::{Orchestrator, Session};
use crate::exec::Invocation;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - `--init` / `--dry-run`
/// - config loading
/// - the session and Ctrl-C handling
/// - the orchestrator
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);

    if args.init {
        write_default_config(&config_path)?;
        info!(path = ?config_path, "wrote default config");
        return Ok(());
    }

    let cfg = load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?
        .with_debug(args.debug);

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let session = Session::new();

    // Ctrl-C → graceful shutdown.
    {
        let session = session.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            session.cancel();
        });
    }

    Orchestrator::new(cfg, session).run().await?;
    Ok(())
}

/// Print the resolved invocations and watch settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("devloop dry-run");
    println!("  watch.app_root = {}", cfg.watch.app_root.display());
    println!("  watch.mode = {:?}", cfg.watch.mode);
    println!("  watch.included_extensions = {:?}", cfg.watch.included_extensions);
    println!("  watch.ignored_folders = {:?}", cfg.watch.ignored_folders);
    println!("  watch.scan_interval = {:?}", cfg.scan_interval());
    println!();

    println!("build: {}", Invocation::build(cfg));
    println!("run:   {}", Invocation::run(cfg, &cfg.artifact_path()));
    println!("error log: {}", cfg.error_log_path().display());
    if !cfg.env.is_empty() {
        println!("env:");
        for (key, value) in cfg.env.iter() {
            println!("  {key}={value}");
        }
    }
    println!();

    if cfg.livereload_active() {
        println!("livereload: port {}", cfg.livereload.port);
        for folder in cfg.livereload_folders() {
            println!("  folder: {}", folder.display());
        }
        for task in cfg.livereload.tasks.iter() {
            println!("  task: {task}");
        }
    } else {
        println!("livereload: off");
    }

    debug!("dry-run complete (no execution)");
}
