// src/exec/mod.rs

//! External task execution.
//!
//! Every rebuild and bootstrap step is an opaque shell command. The
//! [`task::TaskRunner`] trait is the seam: production uses
//! [`task::ShellTaskRunner`], tests substitute a fake.

pub mod task;

pub use task::{ShellTaskRunner, TaskInvocation, TaskReport, TaskRunner, TaskTable, run_checked};
