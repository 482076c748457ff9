use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::errors::Result;
use devloop::exec::{TaskInvocation, TaskReport, TaskRunner};
use devloop::types::TaskId;

#[derive(Debug, Default)]
struct State {
    calls: Vec<TaskInvocation>,
    failures: HashMap<TaskId, i32>,
    delay: Option<Duration>,
}

/// A task runner that never spawns anything:
/// - records every invocation in order
/// - succeeds unless a failure was scripted for the task
///
/// Clones share their state, so a test can keep one copy and hand the other
/// to the code under test.
#[derive(Debug, Clone, Default)]
pub struct FakeTaskRunner {
    state: Arc<Mutex<State>>,
}

impl FakeTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `task` exit with `code` from now on.
    pub fn fail(&self, task: TaskId, code: i32) -> &Self {
        self.state.lock().unwrap().failures.insert(task, code);
        self
    }

    /// Make `task` succeed again.
    pub fn succeed(&self, task: TaskId) -> &Self {
        self.state.lock().unwrap().failures.remove(&task);
        self
    }

    /// Sleep this long inside every task.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Tasks run so far, in order.
    pub fn calls(&self) -> Vec<TaskId> {
        self.state.lock().unwrap().calls.iter().map(|c| c.task).collect()
    }

    pub fn invocations(&self) -> Vec<TaskInvocation> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl TaskRunner for FakeTaskRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a TaskInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
        Box::pin(async move {
            let (delay, failure) = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(invocation.clone());
                (state.delay, state.failures.get(&invocation.task).copied())
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            Ok(match failure {
                Some(code) => TaskReport::failed(code, format!("{} failed", invocation.task)),
                None => TaskReport::success(),
            })
        })
    }
}
