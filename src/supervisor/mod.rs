// src/supervisor/mod.rs

//! Server process supervision.
//!
//! - [`process`] spawns one server instance and watches it exit.
//! - [`control`] kills process trees and frees the server port.
//! - [`restart`] carries restart requests from the dispatcher and runs the
//!   serialized stop/start loop.
//!
//! [`Supervisor`] owns at most one server at a time and moves through
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`.

pub mod control;
pub mod process;
pub mod restart;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ServerSection;
use crate::errors::Result;
use crate::notification::Notifier;
use crate::types::BootMode;

pub use control::{PortRelease, ProcessControl, SystemProcessControl};
pub use process::{ExitKind, ServerProcess, classify_exit};
pub use restart::{
    LifecycleFuture, RequestOutcome, RestartHandle, RestartReceiver, RestartRequest,
    ServerLifecycle, ShutdownSignal, ShutdownTrigger, restart_channel, run_restart_loop,
    shutdown_signal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Owns the single server slot.
pub struct Supervisor<C: ProcessControl> {
    server: ServerSection,
    cwd: PathBuf,
    env: BTreeMap<String, String>,
    control: C,
    notifier: Notifier,
    state: SupervisorState,
    current: Option<ServerProcess>,
}

impl<C: ProcessControl> Supervisor<C> {
    pub fn new(
        server: ServerSection,
        cwd: PathBuf,
        env: BTreeMap<String, String>,
        control: C,
        notifier: Notifier,
    ) -> Self {
        Self {
            server,
            cwd,
            env,
            control,
            notifier,
            state: SupervisorState::Stopped,
            current: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Pid of the current instance, if any.
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().map(ServerProcess::pid)
    }

    /// Start a fresh instance, stopping any existing one first and clearing
    /// the port of stale listeners.
    pub async fn start(&mut self, mode: BootMode) -> Result<()> {
        if self.current.is_some() {
            self.stop().await?;
        }

        self.state = SupervisorState::Starting;
        self.release_port("before start").await;

        let launch = process::LaunchSpec {
            server: &self.server,
            cwd: &self.cwd,
            env: &self.env,
            mode,
        };
        match ServerProcess::spawn(launch, self.notifier.clone()) {
            Ok(proc) => {
                self.current = Some(proc);
                self.state = SupervisorState::Running;
                Ok(())
            }
            Err(err) => {
                self.state = SupervisorState::Stopped;
                self.notifier.error("Server failed to start", &err.to_string());
                Err(err)
            }
        }
    }

    /// Stop the current instance. A no-op when nothing is running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut proc) = self.current.take() else {
            debug!("stop requested but no server is running");
            self.state = SupervisorState::Stopped;
            return Ok(());
        };

        self.state = SupervisorState::Stopping;
        let pid = proc.pid();
        proc.mark_stopping();

        // The leader may be gone while children it spawned still hold the
        // group, so the group kill always runs.
        let leader_exited = proc.has_exited();
        if let Err(err) = self.control.terminate_tree(pid).await {
            if leader_exited {
                debug!(pid, error = %err, "server process group already gone");
            } else {
                warn!(pid, error = %err, "failed to kill server process group");
            }
        }

        let timeout = Duration::from_millis(self.server.stop_timeout_ms);
        match tokio::time::timeout(timeout, proc.wait()).await {
            Ok(_) => debug!(pid, "server exit observed"),
            Err(_) => warn!(pid, ?timeout, "server did not exit in time; falling back to port cleanup"),
        }

        self.release_port("after stop").await;
        self.state = SupervisorState::Stopped;
        info!(pid, "server stopped");
        Ok(())
    }

    async fn release_port(&self, when: &str) {
        let port = self.server.port;
        match self.control.free_port(port).await {
            Ok(PortRelease::AlreadyFree) => debug!(port, when, "port is free"),
            Ok(PortRelease::Killed(pids)) => {
                warn!(port, when, ?pids, "killed processes still holding the server port")
            }
            Err(err) => warn!(port, when, error = %err, "could not free the server port"),
        }
    }
}

impl<C: ProcessControl> ServerLifecycle for Supervisor<C> {
    fn start(&mut self, mode: BootMode) -> restart::LifecycleFuture<'_> {
        Box::pin(Supervisor::start(self, mode))
    }

    fn stop(&mut self) -> restart::LifecycleFuture<'_> {
        Box::pin(Supervisor::stop(self))
    }
}
