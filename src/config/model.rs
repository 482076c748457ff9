// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::pipeline::PipelineTable;
use crate::types::{ChangeKind, TaskId};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [project]
/// root = "backend"
/// quiet_window_ms = 200
///
/// [server]
/// cmd = "go run ./cmd/server"
/// port = 8080
///
/// [tasks]
/// migrate = "go run ./cmd/migrate up"
///
/// [pipeline.seed_source]
/// steps = ["seed"]
/// restart = false
///
/// [[watch.extra]]
/// path = "../frontend/schema_custom.graphql"
/// kind = "api_schema"
/// ```
///
/// All sections are optional and have defaults that suit a Go backend with a
/// MySQL container and a GraphQL frontend next to it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub tasks: TasksSection,

    #[serde(default)]
    pub watch: WatchSection,

    /// Per-kind overrides, keyed by change kind name (`migration_source`, ...).
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineOverride>,

    /// Extra environment forwarded to every task and to the server.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Validated configuration.
///
/// Built from [`RawConfigFile`] through `TryFrom` (see `validate.rs`); the
/// pipeline overrides are already merged into `pipelines`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub tasks: TasksSection,
    pub watch: WatchSection,
    pub pipelines: PipelineTable,
    pub env: BTreeMap<String, String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        // The built-in defaults are known to validate.
        Self {
            project: ProjectSection::default(),
            server: ServerSection::default(),
            database: DatabaseSection::default(),
            tasks: TasksSection::default(),
            watch: WatchSection::default(),
            pipelines: PipelineTable::defaults(),
            env: BTreeMap::new(),
        }
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Directory that is watched and in which tasks run.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Migrations directory, relative to `root`. Only used for the startup
    /// fingerprint; classification relies on the `migrations/` segment.
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// Debounce quiet window.
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Drop write events whose file content did not actually change.
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,

    /// Send desktop notifications on errors.
    #[serde(default = "default_true")]
    pub notifications: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_quiet_window_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            migrations_dir: default_migrations_dir(),
            quiet_window_ms: default_quiet_window_ms(),
            skip_unchanged: true,
            notifications: true,
        }
    }
}

/// `[server]` section: the long-running process owned by the supervisor.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_server_cmd")]
    pub cmd: String,

    /// Port the server listens on; freed before every start.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Environment variable carrying `true` on restarts, `false` on first boot.
    #[serde(default = "default_restart_env")]
    pub restart_env: String,

    /// How long `stop()` waits for the killed group to be reaped.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

fn default_server_cmd() -> String {
    "go run ./cmd/server".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_restart_env() -> String {
    "DEVLOOP_RESTART".to_string()
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            cmd: default_server_cmd(),
            port: default_server_port(),
            restart_env: default_restart_env(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

/// `[database]` section used by the readiness check.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    /// Variables that must be set before a connection is attempted.
    #[serde(default = "default_required_env")]
    pub required_env: Vec<String>,

    #[serde(default = "default_host_env")]
    pub host_env: String,

    #[serde(default = "default_port_env")]
    pub port_env: String,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_required_env() -> Vec<String> {
    [
        "DATABASE_USER",
        "DATABASE_PASSWORD",
        "DATABASE_HOST",
        "DATABASE_PORT",
        "DATABASE_NAME",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_host_env() -> String {
    "DATABASE_HOST".to_string()
}

fn default_port_env() -> String {
    "DATABASE_PORT".to_string()
}

fn default_retry_interval_ms() -> u64 {
    1000
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            required_env: default_required_env(),
            host_env: default_host_env(),
            port_env: default_port_env(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// `[tasks]` section: one shell command per external task.
///
/// An empty string disables the task; pipelines skip it.
#[derive(Debug, Clone, Deserialize)]
pub struct TasksSection {
    #[serde(default = "default_install_deps")]
    pub install_deps: String,
    #[serde(default = "default_database_up")]
    pub database_up: String,
    #[serde(default = "default_reset_schema")]
    pub reset_schema: String,
    #[serde(default = "default_migrate")]
    pub migrate: String,
    #[serde(default = "default_generate_bindings")]
    pub generate_bindings: String,
    #[serde(default = "default_merge_frontend_schema")]
    pub merge_frontend_schema: String,
    #[serde(default = "default_seed")]
    pub seed: String,
}

fn default_install_deps() -> String {
    "go mod download".to_string()
}

fn default_database_up() -> String {
    "docker-compose up -d".to_string()
}

fn default_reset_schema() -> String {
    "go run ./cmd/dbreset".to_string()
}

fn default_migrate() -> String {
    "go run ./cmd/migrate up".to_string()
}

fn default_generate_bindings() -> String {
    "sqlboiler mysql --wipe".to_string()
}

fn default_merge_frontend_schema() -> String {
    "npm --prefix ../frontend run generate".to_string()
}

fn default_seed() -> String {
    "go run ./cmd/seed".to_string()
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            install_deps: default_install_deps(),
            database_up: default_database_up(),
            reset_schema: default_reset_schema(),
            migrate: default_migrate(),
            generate_bindings: default_generate_bindings(),
            merge_frontend_schema: default_merge_frontend_schema(),
            seed: default_seed(),
        }
    }
}

impl TasksSection {
    /// Shell command configured for `task` (possibly empty).
    pub fn command(&self, task: TaskId) -> &str {
        match task {
            TaskId::InstallDeps => &self.install_deps,
            TaskId::DatabaseUp => &self.database_up,
            TaskId::ResetSchema => &self.reset_schema,
            TaskId::Migrate => &self.migrate,
            TaskId::GenerateBindings => &self.generate_bindings,
            TaskId::MergeFrontendSchema => &self.merge_frontend_schema,
            TaskId::Seed => &self.seed,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directory globs (relative to root) that are never registered.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Path globs whose files are outputs of the pipeline itself.
    #[serde(default = "default_generated")]
    pub generated: Vec<String>,

    /// File-name prefixes marking generated files anywhere in the tree.
    #[serde(default = "default_generated_prefixes")]
    pub generated_prefixes: Vec<String>,

    /// Extensions (without dot) of ordinary server source files.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    /// Extensions (without dot) of interface-definition files.
    #[serde(default = "default_api_schema_extensions")]
    pub api_schema_extensions: Vec<String>,

    /// Single files or directories outside `root` that are watched too.
    #[serde(default)]
    pub extra: Vec<ExtraWatch>,
}

fn default_exclude() -> Vec<String> {
    [
        "**/.git",
        "**/.idea",
        "**/.vscode",
        "**/node_modules",
        "models",
        "**/generated",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_generated() -> Vec<String> {
    ["models/**", "**/generated/**"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_generated_prefixes() -> Vec<String> {
    vec!["generated".to_string(), "zz_generated".to_string()]
}

fn default_source_extensions() -> Vec<String> {
    vec!["go".to_string()]
}

fn default_api_schema_extensions() -> Vec<String> {
    vec!["graphql".to_string(), "graphqls".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            generated: default_generated(),
            generated_prefixes: default_generated_prefixes(),
            source_extensions: default_source_extensions(),
            api_schema_extensions: default_api_schema_extensions(),
            extra: Vec::new(),
        }
    }
}

/// `[[watch.extra]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraWatch {
    /// File or directory, relative to `root` unless absolute.
    pub path: PathBuf,

    /// Kind assigned to every write under `path`. When omitted the path is
    /// classified like any other.
    #[serde(default)]
    pub kind: Option<ChangeKind>,
}

/// `[pipeline.<kind>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineOverride {
    #[serde(default)]
    pub steps: Option<Vec<StepSpec>>,

    #[serde(default)]
    pub restart: Option<bool>,
}

/// A pipeline step as written in TOML: either `"migrate"` or
/// `{ task = "merge_frontend_schema", fatal = false }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepSpec {
    Name(TaskId),
    Detailed {
        task: TaskId,
        #[serde(default = "default_true")]
        fatal: bool,
    },
}
