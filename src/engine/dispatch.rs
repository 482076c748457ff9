// src/engine/dispatch.rs

//! Rebuild pipeline dispatcher.
//!
//! Runs the steps for one [`ChangeKind`] strictly in order and, if they all
//! succeed and the pipeline says so, emits one restart request. It never
//! touches the server process itself.

use tracing::{debug, error, info, warn};

use crate::engine::pipeline::PipelineTable;
use crate::exec::task::{TaskRunner, TaskTable};
use crate::notification::Notifier;
use crate::supervisor::restart::{RequestOutcome, RestartHandle};
use crate::types::{ChangeKind, TaskId};

/// Result of dispatching one change kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No pipeline exists for this kind.
    Ignored,
    /// Every fatal step succeeded.
    Completed { restart_requested: bool },
    /// A fatal step failed; later steps did not run and no restart was
    /// requested.
    Aborted { task: TaskId, error: String },
}

/// Owns the pipeline table, the task runner and the restart handle.
pub struct Dispatcher<R: TaskRunner> {
    pipelines: PipelineTable,
    tasks: TaskTable,
    runner: R,
    restart: RestartHandle,
    notifier: Notifier,
}

impl<R: TaskRunner> std::fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pipelines", &self.pipelines)
            .finish_non_exhaustive()
    }
}

impl<R: TaskRunner> Dispatcher<R> {
    pub fn new(
        pipelines: PipelineTable,
        tasks: TaskTable,
        runner: R,
        restart: RestartHandle,
        notifier: Notifier,
    ) -> Self {
        Self {
            pipelines,
            tasks,
            runner,
            restart,
            notifier,
        }
    }

    pub async fn dispatch(&self, kind: ChangeKind) -> DispatchOutcome {
        let Some(pipeline) = self.pipelines.get(kind) else {
            debug!(kind = %kind, "no pipeline for change kind");
            return DispatchOutcome::Ignored;
        };

        info!(
            kind = %kind,
            steps = pipeline.steps.len(),
            restart = pipeline.restarts_server,
            "running rebuild pipeline"
        );

        for step in &pipeline.steps {
            if let Err(err) = crate::exec::task::run_checked(&self.runner, &self.tasks, step.task).await {
                if step.fatal {
                    error!(
                        kind = %kind,
                        task = %step.task,
                        error = %err,
                        "rebuild step failed; keeping the current server running"
                    );
                    self.notifier
                        .error(&format!("devloop: {} failed", step.task), &err.to_string());
                    return DispatchOutcome::Aborted {
                        task: step.task,
                        error: err.to_string(),
                    };
                }
                warn!(
                    kind = %kind,
                    task = %step.task,
                    error = %err,
                    "non-fatal rebuild step failed; continuing"
                );
            }
        }

        if !pipeline.restarts_server {
            info!(kind = %kind, "rebuild pipeline finished");
            return DispatchOutcome::Completed {
                restart_requested: false,
            };
        }

        match self.restart.request() {
            RequestOutcome::Queued | RequestOutcome::Coalesced => {
                info!(kind = %kind, "rebuild pipeline finished; server restart requested");
                DispatchOutcome::Completed {
                    restart_requested: true,
                }
            }
            RequestOutcome::Closed => {
                warn!(kind = %kind, "restart loop is gone; cannot restart server");
                DispatchOutcome::Completed {
                    restart_requested: false,
                }
            }
        }
    }
}
