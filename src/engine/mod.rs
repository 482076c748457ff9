// src/engine/mod.rs

//! Change handling between the watcher and the supervisor.
//!
//! - [`debounce`] coalesces bursts of changes into one action per quiet
//!   window.
//! - [`pipeline`] holds the fixed change-kind → rebuild-steps table.
//! - [`dispatch`] runs a pipeline and asks for a server restart.

pub mod debounce;
pub mod dispatch;
pub mod pipeline;

pub use debounce::{DebounceHandle, DebounceState, Debouncer};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use pipeline::{PipelineStep, PipelineTable, RebuildPipeline};
