// src/lib.rs

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod notification;
pub mod signals;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::bootstrap::Session;
use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_or_default;
use crate::exec::task::ShellTaskRunner;
use crate::notification::Notifier;
use crate::signals::forward_quit_signals;
use crate::supervisor::{SystemProcessControl, shutdown_signal};
use crate::types::TaskId;

/// High-level entry point used by `main.rs`.
///
/// Loads the config (or defaults), resolves the project root, installs the
/// quit-signal handlers and runs the session until it is asked to quit.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_default(&config_path)?;
    let root = project_root(&config_path, &cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &root);
        return Ok(());
    }

    let (trigger, shutdown) = shutdown_signal();
    forward_quit_signals(trigger)?;

    let notifier = Notifier::new(cfg.project.notifications);
    let session = Session::new(cfg, root, notifier);
    session
        .run(ShellTaskRunner, SystemProcessControl, shutdown)
        .await?;
    Ok(())
}

/// `project.root` is relative to the directory holding the config file, or
/// to the current directory for a bare file name.
fn project_root(config_path: &Path, cfg: &ConfigFile) -> Result<PathBuf> {
    let base = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().context("reading current directory")?,
    };
    let root = base.join(&cfg.project.root);
    root.canonicalize()
        .with_context(|| format!("project root {:?} does not exist", root))
}

fn print_dry_run(cfg: &ConfigFile, root: &Path) {
    println!("devloop dry-run");
    println!("  root = {}", root.display());
    println!("  quiet_window_ms = {}", cfg.project.quiet_window_ms);
    println!("  skip_unchanged = {}", cfg.project.skip_unchanged);
    println!(
        "  server = {:?} on port {} ({}=true|false)",
        cfg.server.cmd, cfg.server.port, cfg.server.restart_env
    );
    println!();

    println!("tasks:");
    for task in TaskId::ALL {
        let cmd = cfg.tasks.command(task);
        if cmd.trim().is_empty() {
            println!("  - {task}: (disabled)");
        } else {
            println!("  - {task}: {cmd}");
        }
    }
    println!();

    println!("pipelines:");
    for (kind, pipeline) in cfg.pipelines.iter() {
        let steps: Vec<String> = pipeline
            .steps
            .iter()
            .map(|s| {
                if s.fatal {
                    s.task.to_string()
                } else {
                    format!("{}?", s.task)
                }
            })
            .collect();
        println!(
            "  - {kind}: [{}] restart={}",
            steps.join(", "),
            pipeline.restarts_server
        );
    }

    if !cfg.watch.extra.is_empty() {
        println!();
        println!("extra watches:");
        for extra in &cfg.watch.extra {
            match extra.kind {
                Some(kind) => println!("  - {} as {kind}", extra.path.display()),
                None => println!("  - {}", extra.path.display()),
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
