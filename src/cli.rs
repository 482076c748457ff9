// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `devloop`.
///
/// Every flag is optional: a bare `devloop` runs the whole
/// bootstrap-then-watch lifecycle from the current directory.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devloop",
    version,
    about = "Watch a project, rebuild what changed and keep the dev server running.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// A missing file is fine; built-in defaults are used instead.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the configuration and pipelines, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_the_file_in_the_current_directory() {
        let args = CliArgs::try_parse_from(["devloop"]).unwrap();
        assert_eq!(args.config, DEFAULT_CONFIG_FILE);
        assert!(!args.dry_run);

        let args = CliArgs::try_parse_from(["devloop", "--config", "dev/loop.toml"]).unwrap();
        assert_eq!(args.config, "dev/loop.toml");
    }
}
