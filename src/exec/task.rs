// src/exec/task.rs

//! External task invocation boundary.
//!
//! Every rebuild and bootstrap step is a shell command run to completion in
//! the project root with the forwarded environment. The caller waits for it
//! to exit and gets back the exit code plus the captured stderr.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::TasksSection;
use crate::errors::{DevloopError, Result};
use crate::types::TaskId;

/// A fully resolved task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvocation {
    pub task: TaskId,
    pub cmd: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// Outcome of one finished task process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub exit_code: i32,
    pub stderr: String,
}

impl TaskReport {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait abstracting how external tasks are executed.
///
/// Production code uses [`ShellTaskRunner`]; tests provide a scripted fake.
pub trait TaskRunner: Send + Sync {
    /// Run `invocation` to completion.
    ///
    /// `Err` means the process could not be run at all; a process that ran
    /// and exited non-zero is an `Ok` report with a non-zero code.
    fn run<'a>(
        &'a self,
        invocation: &'a TaskInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>>;
}

/// Resolves [`TaskId`]s into invocations using the `[tasks]` config.
#[derive(Debug, Clone)]
pub struct TaskTable {
    commands: TasksSection,
    cwd: PathBuf,
    env: BTreeMap<String, String>,
}

impl TaskTable {
    pub fn new(commands: TasksSection, cwd: PathBuf, env: BTreeMap<String, String>) -> Self {
        Self { commands, cwd, env }
    }

    /// `None` when the task is disabled (empty command).
    pub fn invocation(&self, task: TaskId) -> Option<TaskInvocation> {
        let cmd = self.commands.command(task).trim();
        if cmd.is_empty() {
            return None;
        }
        Some(TaskInvocation {
            task,
            cmd: cmd.to_string(),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
        })
    }
}

/// Run `task` and turn a non-zero exit into [`DevloopError::TaskFailed`].
///
/// Disabled tasks succeed without running anything.
pub async fn run_checked<R: TaskRunner + ?Sized>(
    runner: &R,
    table: &TaskTable,
    task: TaskId,
) -> Result<()> {
    let Some(invocation) = table.invocation(task) else {
        debug!(task = %task, "task disabled (empty command); skipping");
        return Ok(());
    };

    let report = runner.run(&invocation).await?;
    if report.is_success() {
        Ok(())
    } else {
        Err(DevloopError::TaskFailed {
            task: task.to_string(),
            code: report.exit_code,
            stderr: report.stderr,
        })
    }
}

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Real runner: `sh -c <cmd>` (or `cmd /C` on Windows).
///
/// stdout lines are logged at info, stderr lines at warn and captured.
#[derive(Debug, Clone, Default)]
pub struct ShellTaskRunner;

impl ShellTaskRunner {
    async fn run_inner(invocation: &TaskInvocation) -> Result<TaskReport> {
        info!(task = %invocation.task, cmd = %invocation.cmd, "running task");

        let mut cmd = shell_command(&invocation.cmd);
        cmd.current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", invocation.task))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let task = invocation.task;
        let stdout_pump = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(task = %task, "{}", line);
                }
            }
        });

        let stderr_pump = tokio::spawn(async move {
            let mut captured = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(task = %task, "stderr: {}", line);
                    captured.push_str(&line);
                    captured.push('\n');
                }
            }
            captured
        });

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of task '{}'", invocation.task))?;

        let _ = stdout_pump.await;
        let stderr = stderr_pump.await.unwrap_or_default();

        let exit_code = status.code().unwrap_or(-1);
        info!(
            task = %invocation.task,
            exit_code,
            success = status.success(),
            "task process exited"
        );

        // Killed-by-signal has no code; -1 keeps it distinct from success.
        Ok(TaskReport { exit_code, stderr })
    }
}

impl TaskRunner for ShellTaskRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a TaskInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
        Box::pin(Self::run_inner(invocation))
    }
}
