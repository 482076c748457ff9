use std::path::PathBuf;

use devloop::config::{
    ConfigFile, ExtraWatch, PipelineOverride, RawConfigFile, StepSpec,
};
use devloop::types::{ChangeKind, TaskId};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with notifications off.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.project.notifications = false;
        Self { config }
    }

    pub fn quiet_window_ms(mut self, ms: u64) -> Self {
        self.config.project.quiet_window_ms = ms;
        self
    }

    pub fn skip_unchanged(mut self, val: bool) -> Self {
        self.config.project.skip_unchanged = val;
        self
    }

    pub fn server(mut self, cmd: &str, port: u16) -> Self {
        self.config.server.cmd = cmd.to_string();
        self.config.server.port = port;
        self
    }

    pub fn stop_timeout_ms(mut self, ms: u64) -> Self {
        self.config.server.stop_timeout_ms = ms;
        self
    }

    pub fn task(mut self, task: TaskId, cmd: &str) -> Self {
        let tasks = &mut self.config.tasks;
        let slot = match task {
            TaskId::InstallDeps => &mut tasks.install_deps,
            TaskId::DatabaseUp => &mut tasks.database_up,
            TaskId::ResetSchema => &mut tasks.reset_schema,
            TaskId::Migrate => &mut tasks.migrate,
            TaskId::GenerateBindings => &mut tasks.generate_bindings,
            TaskId::MergeFrontendSchema => &mut tasks.merge_frontend_schema,
            TaskId::Seed => &mut tasks.seed,
        };
        *slot = cmd.to_string();
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn extra_watch(mut self, path: impl Into<PathBuf>, kind: Option<ChangeKind>) -> Self {
        self.config.watch.extra.push(ExtraWatch {
            path: path.into(),
            kind,
        });
        self
    }

    pub fn pipeline(mut self, kind: ChangeKind, steps: &[TaskId], restart: bool) -> Self {
        self.config.pipeline.insert(
            kind.as_str().to_string(),
            PipelineOverride {
                steps: Some(steps.iter().copied().map(StepSpec::Name).collect()),
                restart: Some(restart),
            },
        );
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn database_retry_ms(mut self, ms: u64) -> Self {
        self.config.database.retry_interval_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
