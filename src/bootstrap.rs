// src/bootstrap.rs

//! Bootstrap sequencer.
//!
//! Runs the one-time startup steps strictly in order, then wires the watch
//! aggregator, debouncer, dispatcher and supervisor together and serves
//! restart requests until shutdown. Any failure before the server is up is
//! fatal.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, DatabaseSection, project_name};
use crate::db::wait_for_database;
use crate::engine::debounce::Debouncer;
use crate::engine::dispatch::{DispatchOutcome, Dispatcher};
use crate::errors::Result;
use crate::exec::task::{TaskRunner, TaskTable, run_checked};
use crate::notification::Notifier;
use crate::supervisor::{ProcessControl, ShutdownSignal, Supervisor, run_restart_loop, restart_channel};
use crate::types::{BootMode, TaskId};
use crate::watch::aggregator::WatchAggregator;
use crate::watch::hash::{ContentCache, fingerprint_tree};

/// Environment variable carrying the per-project container namespace.
pub const PROJECT_NAME_ENV: &str = "COMPOSE_PROJECT_NAME";

/// One step of the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    Task(TaskId),
    WaitForDatabase,
}

impl fmt::Display for BootStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootStep::Task(task) => write!(f, "{task}"),
            BootStep::WaitForDatabase => f.write_str("wait_for_database"),
        }
    }
}

pub const BOOT_STEPS: [BootStep; 8] = [
    BootStep::Task(TaskId::InstallDeps),
    BootStep::Task(TaskId::DatabaseUp),
    BootStep::WaitForDatabase,
    BootStep::Task(TaskId::ResetSchema),
    BootStep::Task(TaskId::Migrate),
    BootStep::Task(TaskId::GenerateBindings),
    BootStep::Task(TaskId::MergeFrontendSchema),
    BootStep::Task(TaskId::Seed),
];

/// The environment every task and the server receive: the `[env]` table plus
/// the project name, unless `[env]` already sets it.
pub fn session_env(cfg: &ConfigFile, root: &Path) -> BTreeMap<String, String> {
    let mut env = cfg.env.clone();
    env.entry(PROJECT_NAME_ENV.to_string())
        .or_insert_with(|| project_name(root));
    env
}

/// Run [`BOOT_STEPS`] in order, stopping at the first failure.
pub async fn prepare<R, F>(
    runner: &R,
    tasks: &TaskTable,
    database: &DatabaseSection,
    lookup: F,
    notifier: &Notifier,
) -> Result<()>
where
    R: TaskRunner + ?Sized,
    F: Fn(&str) -> Option<String>,
{
    for step in BOOT_STEPS {
        info!(step = %step, "bootstrap step");
        let outcome = match step {
            BootStep::Task(task) => run_checked(runner, tasks, task).await,
            BootStep::WaitForDatabase => wait_for_database(database, &lookup).await.map(|_| ()),
        };
        if let Err(err) = outcome {
            error!(step = %step, error = %err, "bootstrap failed");
            notifier.error("devloop: bootstrap failed", &format!("{step}: {err}"));
            return Err(err);
        }
    }
    Ok(())
}

fn log_migrations_fingerprint(dir: &Path) {
    match fingerprint_tree(dir) {
        Ok(hash) => info!(dir = ?dir, fingerprint = %hash, "migrations fingerprint"),
        Err(err) => warn!(dir = ?dir, error = %err, "could not fingerprint migrations"),
    }
}

/// After a failed pipeline the saved content hashes no longer describe a
/// built state, so re-saving an unchanged file must be able to retry.
fn forget_hashes_on_abort(outcome: &DispatchOutcome, cache: Option<&ContentCache>) {
    if let (DispatchOutcome::Aborted { task, .. }, Some(cache)) = (outcome, cache) {
        debug!(task = %task, "rebuild aborted; forgetting content hashes");
        cache.clear();
    }
}

/// A fully configured dev session rooted at one project directory.
#[derive(Debug)]
pub struct Session {
    cfg: ConfigFile,
    root: PathBuf,
    env: BTreeMap<String, String>,
    notifier: Notifier,
}

impl Session {
    pub fn new(cfg: ConfigFile, root: PathBuf, notifier: Notifier) -> Self {
        let env = session_env(&cfg, &root);
        Self {
            cfg,
            root,
            env,
            notifier,
        }
    }

    /// Bootstrap, start the server and serve restarts until `shutdown`
    /// fires. Returns the number of restarts performed.
    ///
    /// Shutdown is honoured at any point: during bootstrap it abandons the
    /// running step and returns without starting the server.
    pub async fn run<R, C>(self, runner: R, control: C, mut shutdown: ShutdownSignal) -> Result<u64>
    where
        R: TaskRunner + 'static,
        C: ProcessControl + 'static,
    {
        let Session {
            cfg,
            root,
            env,
            notifier,
        } = self;

        let tasks = TaskTable::new(cfg.tasks.clone(), root.clone(), env.clone());
        let lookup = |name: &str| env.get(name).cloned().or_else(|| std::env::var(name).ok());
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                info!("shutdown requested during bootstrap");
                return Ok(0);
            }

            prepared = prepare(&runner, &tasks, &cfg.database, lookup, &notifier) => prepared?,
        }

        log_migrations_fingerprint(&root.join(&cfg.project.migrations_dir));

        let aggregator = match WatchAggregator::new(&cfg, &root, notifier.clone()) {
            Ok(aggregator) => aggregator,
            Err(err) => {
                error!(error = %err, "cannot start watching");
                notifier.error("devloop: watch failed", &err.to_string());
                return Err(err);
            }
        };
        info!(dirs = aggregator.registered(), root = ?root, "watching for changes");

        let (restart, restart_rx) = restart_channel();
        let dispatcher = Arc::new(Dispatcher::new(
            cfg.pipelines.clone(),
            tasks,
            runner,
            restart,
            notifier.clone(),
        ));
        let (debouncer, debounce) =
            Debouncer::new(Duration::from_millis(cfg.project.quiet_window_ms));

        let cache = aggregator.content_cache();
        let watch_task = tokio::spawn(aggregator.run(debounce));
        let dispatch_task = tokio::spawn(debouncer.run(move |kind| {
            let dispatcher = dispatcher.clone();
            let cache = cache.clone();
            async move {
                let outcome = dispatcher.dispatch(kind).await;
                forget_hashes_on_abort(&outcome, cache.as_ref());
            }
        }));

        if shutdown.is_fired() {
            info!("shutdown requested before the server started");
            watch_task.abort();
            dispatch_task.abort();
            return Ok(0);
        }

        let mut supervisor = Supervisor::new(cfg.server.clone(), root, env, control, notifier);
        let result = match supervisor.start(BootMode::FirstBoot).await {
            Ok(()) => run_restart_loop(&mut supervisor, restart_rx, &mut shutdown).await,
            Err(err) => {
                error!(error = %err, "server failed to start");
                Err(err)
            }
        };

        watch_task.abort();
        dispatch_task.abort();

        if let Ok(restarts) = &result {
            info!(restarts, "devloop stopped");
        }
        result
    }
}
