// src/config/mod.rs

//! Configuration loading and validation for devloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to defaults (`loader.rs`).
//! - Validate and resolve it into a [`ConfigFile`] (`validate.rs`).
//! - Derive the project identity from the working directory (`project.rs`).

pub mod loader;
pub mod model;
pub mod project;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, DatabaseSection, ExtraWatch, PipelineOverride, ProjectSection, RawConfigFile,
    ServerSection, StepSpec, TasksSection, WatchSection,
};
pub use project::project_name;
