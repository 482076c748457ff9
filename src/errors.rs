// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("required environment variable {0} is not set")]
    MissingEnv(String),

    #[error("invalid database address: {0}")]
    DatabaseAddress(String),

    #[error("cannot watch {path:?}: {source}")]
    WatchRegistration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("task '{task}' failed with exit code {code}: {stderr}")]
    TaskFailed {
        task: String,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DevloopError>;
