// src/supervisor/process.rs

//! A single spawned server instance and the task that watches it exit.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, anyhow};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ServerSection;
use crate::errors::Result;
use crate::exec::task::shell_command;
use crate::notification::Notifier;
use crate::types::BootMode;

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Why the server process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// We asked it to stop.
    Requested,
    /// It exited on its own with status 0.
    Clean,
    /// It exited on its own with a non-zero status.
    Crashed(i32),
    /// It was killed by a signal we did not send.
    Signaled(i32),
}

impl ExitKind {
    pub fn is_unexpected(&self) -> bool {
        matches!(self, ExitKind::Crashed(_) | ExitKind::Signaled(_))
    }
}

/// Decide how to report an exit. A stop we initiated always wins, since the
/// forced kill itself shows up as a signal or a failure code.
pub fn classify_exit(code: Option<i32>, signal: Option<i32>, stop_requested: bool) -> ExitKind {
    if stop_requested {
        return ExitKind::Requested;
    }
    match (code, signal) {
        (Some(0), _) => ExitKind::Clean,
        (Some(code), _) => ExitKind::Crashed(code),
        (None, Some(sig)) => ExitKind::Signaled(sig),
        (None, None) => ExitKind::Crashed(-1),
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Everything needed to launch the server once.
#[derive(Debug, Clone)]
pub struct LaunchSpec<'a> {
    pub server: &'a ServerSection,
    pub cwd: &'a Path,
    pub env: &'a BTreeMap<String, String>,
    pub mode: BootMode,
}

/// A running (or recently exited) server process.
#[derive(Debug)]
pub struct ServerProcess {
    pid: u32,
    stop_requested: Arc<AtomicBool>,
    monitor: JoinHandle<ExitKind>,
}

impl ServerProcess {
    /// Spawn the server in its own process group and start watching it.
    pub fn spawn(launch: LaunchSpec<'_>, notifier: Notifier) -> Result<Self> {
        let mut cmd = shell_command(&launch.server.cmd);
        cmd.current_dir(launch.cwd)
            .envs(launch.env)
            .env(
                &launch.server.restart_env,
                if launch.mode.is_restart() { "true" } else { "false" },
            )
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning server '{}'", launch.server.cmd))?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("server process exited before its pid was read"))?;

        info!(pid, mode = ?launch.mode, cmd = %launch.server.cmd, "server started");

        let stop_requested = Arc::new(AtomicBool::new(false));
        let monitor = tokio::spawn(monitor(child, pid, stop_requested.clone(), notifier));

        Ok(Self {
            pid,
            stop_requested,
            monitor,
        })
    }

    /// Process id, which is also the process group id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.monitor.is_finished()
    }

    /// Flag the coming exit as ours so the monitor does not report a crash.
    pub fn mark_stopping(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Wait for the monitor to observe the exit.
    pub async fn wait(&mut self) -> Option<ExitKind> {
        (&mut self.monitor).await.ok()
    }
}

async fn monitor(
    mut child: Child,
    pid: u32,
    stop_requested: Arc<AtomicBool>,
    notifier: Notifier,
) -> ExitKind {
    let status = child.wait().await;
    let requested = stop_requested.load(Ordering::SeqCst);

    let kind = match &status {
        Ok(status) => classify_exit(status.code(), exit_signal(status), requested),
        Err(err) => {
            error!(pid, error = %err, "failed to wait for server process");
            classify_exit(None, None, requested)
        }
    };

    match kind {
        ExitKind::Requested => debug!(pid, "server stopped"),
        ExitKind::Clean => info!(pid, "server exited on its own"),
        ExitKind::Crashed(code) => {
            error!(pid, code, "server crashed; waiting for the next change to restart it");
            notifier.error("Server crashed", &format!("exit code {code}"));
        }
        ExitKind::Signaled(sig) => {
            error!(pid, signal = sig, "server was killed; waiting for the next change to restart it");
            notifier.error("Server killed", &format!("signal {sig}"));
        }
    }
    kind
}
