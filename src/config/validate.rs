// src/config/validate.rs

use std::str::FromStr;

use globset::Glob;

use crate::config::model::{ConfigFile, PipelineOverride, RawConfigFile, StepSpec};
use crate::engine::pipeline::{PipelineStep, PipelineTable, RebuildPipeline};
use crate::errors::{DevloopError, Result};
use crate::types::ChangeKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DevloopError;

    /// Run semantic validation and resolve pipeline overrides.
    ///
    /// This checks:
    /// - the quiet window, stop timeout and retry interval are non-zero
    /// - the server command and port are set
    /// - every watch/generated glob compiles
    /// - pipeline override keys name an actionable change kind
    /// - `[[watch.extra]]` kinds are actionable
    fn try_from(raw: RawConfigFile) -> Result<Self> {
        validate_project(&raw)?;
        validate_server(&raw)?;
        validate_globs(&raw)?;
        validate_extra(&raw)?;
        let pipelines = resolve_pipelines(&raw)?;

        Ok(ConfigFile {
            project: raw.project,
            server: raw.server,
            database: raw.database,
            tasks: raw.tasks,
            watch: raw.watch,
            pipelines,
            env: raw.env,
        })
    }
}

fn validate_project(raw: &RawConfigFile) -> Result<()> {
    if raw.project.quiet_window_ms == 0 {
        return Err(DevloopError::ConfigError(
            "[project].quiet_window_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if raw.database.retry_interval_ms == 0 {
        return Err(DevloopError::ConfigError(
            "[database].retry_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(raw: &RawConfigFile) -> Result<()> {
    if raw.server.cmd.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[server].cmd must not be empty".to_string(),
        ));
    }
    if raw.server.port == 0 {
        return Err(DevloopError::ConfigError(
            "[server].port must be a concrete port (got 0)".to_string(),
        ));
    }
    if raw.server.stop_timeout_ms == 0 {
        return Err(DevloopError::ConfigError(
            "[server].stop_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if raw.server.restart_env.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[server].restart_env must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_globs(raw: &RawConfigFile) -> Result<()> {
    for pat in raw.watch.exclude.iter().chain(raw.watch.generated.iter()) {
        Glob::new(pat).map_err(|e| {
            DevloopError::ConfigError(format!("invalid glob pattern {pat:?} in [watch]: {e}"))
        })?;
    }
    Ok(())
}

fn validate_extra(raw: &RawConfigFile) -> Result<()> {
    for extra in &raw.watch.extra {
        if let Some(kind) = extra.kind {
            if !kind.is_actionable() {
                return Err(DevloopError::ConfigError(format!(
                    "[[watch.extra]] {:?} uses kind '{kind}', which never triggers anything",
                    extra.path
                )));
            }
        }
    }
    Ok(())
}

fn resolve_pipelines(raw: &RawConfigFile) -> Result<PipelineTable> {
    let mut table = PipelineTable::defaults();

    for (key, over) in &raw.pipeline {
        let kind = ChangeKind::from_str(key)
            .map_err(|e| DevloopError::ConfigError(format!("[pipeline.{key}]: {e}")))?;
        if !kind.is_actionable() {
            return Err(DevloopError::ConfigError(format!(
                "[pipeline.{key}]: '{kind}' changes never reach the dispatcher"
            )));
        }
        let base = table.get(kind).cloned().unwrap_or_default();
        table = table.with_pipeline(kind, apply_override(base, over));
    }

    Ok(table)
}

fn apply_override(base: RebuildPipeline, over: &PipelineOverride) -> RebuildPipeline {
    let steps = match &over.steps {
        Some(specs) => specs.iter().map(step_from_spec).collect(),
        None => base.steps,
    };
    RebuildPipeline {
        steps,
        restarts_server: over.restart.unwrap_or(base.restarts_server),
    }
}

fn step_from_spec(spec: &StepSpec) -> PipelineStep {
    match *spec {
        StepSpec::Name(task) => PipelineStep::fatal(task),
        StepSpec::Detailed { task, fatal } => PipelineStep { task, fatal },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.project.quiet_window_ms, 200);
        assert_eq!(cfg.server.port, 8080);
        let seed = cfg.pipelines.get(ChangeKind::SeedSource).unwrap();
        assert!(!seed.restarts_server);
    }

    #[test]
    fn pipeline_override_replaces_steps_and_keeps_restart_flag() {
        let cfg = parse(
            r#"
[pipeline.api_schema]
steps = ["generate_bindings", { task = "merge_frontend_schema", fatal = false }]
"#,
        )
        .unwrap();

        let p = cfg.pipelines.get(ChangeKind::ApiSchema).unwrap();
        assert_eq!(
            p.steps,
            vec![
                PipelineStep::fatal(TaskId::GenerateBindings),
                PipelineStep {
                    task: TaskId::MergeFrontendSchema,
                    fatal: false
                },
            ]
        );
        assert!(p.restarts_server);
    }

    #[test]
    fn override_for_generated_kind_is_rejected() {
        let err = parse("[pipeline.generated_artifact]\nrestart = true\n").unwrap_err();
        match err {
            DevloopError::ConfigError(msg) => assert!(msg.contains("never reach")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_pipeline_key_is_rejected() {
        assert!(matches!(
            parse("[pipeline.css]\nrestart = true\n"),
            Err(DevloopError::ConfigError(_))
        ));
    }

    #[test]
    fn zero_port_and_bad_glob_are_rejected() {
        assert!(matches!(
            parse("[server]\nport = 0\n"),
            Err(DevloopError::ConfigError(_))
        ));
        assert!(matches!(
            parse("[watch]\nexclude = [\"a/[\"]\n"),
            Err(DevloopError::ConfigError(_))
        ));
    }

    #[test]
    fn extra_watch_kind_must_be_actionable() {
        let src = r#"
[[watch.extra]]
path = "../frontend/src/generated"
kind = "irrelevant"
"#;
        assert!(matches!(parse(src), Err(DevloopError::ConfigError(_))));
    }
}
