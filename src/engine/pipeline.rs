// src/engine/pipeline.rs

//! The fixed change-kind → rebuild-steps table.

use std::collections::BTreeMap;

use crate::types::{ChangeKind, TaskId};

/// One external task invocation inside a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStep {
    pub task: TaskId,
    /// A failing fatal step aborts the rest of the pipeline and suppresses
    /// the restart; a failing non-fatal step is only logged.
    pub fatal: bool,
}

impl PipelineStep {
    pub fn fatal(task: TaskId) -> Self {
        Self { task, fatal: true }
    }
}

/// Ordered steps for one change kind, plus whether a fully successful run
/// ends with a server restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildPipeline {
    pub steps: Vec<PipelineStep>,
    pub restarts_server: bool,
}

impl RebuildPipeline {
    fn new(tasks: &[TaskId], restarts_server: bool) -> Self {
        Self {
            steps: tasks.iter().copied().map(PipelineStep::fatal).collect(),
            restarts_server,
        }
    }
}

/// Immutable mapping from [`ChangeKind`] to [`RebuildPipeline`].
///
/// Built once from config at startup. `GeneratedArtifact` and `Irrelevant`
/// never have an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineTable {
    map: BTreeMap<ChangeKind, RebuildPipeline>,
}

impl PipelineTable {
    /// Default table:
    ///
    /// | kind                                   | steps                                          | restart |
    /// |----------------------------------------|------------------------------------------------|---------|
    /// | `migration_source`, `schema_definition`| reset_schema, migrate, generate_bindings, seed | yes     |
    /// | `api_schema`                           | generate_bindings, merge_frontend_schema       | yes     |
    /// | `seed_source`                          | seed                                           | no      |
    /// | `server_source`                        | (none)                                         | yes     |
    pub fn defaults() -> Self {
        let schema = RebuildPipeline::new(
            &[
                TaskId::ResetSchema,
                TaskId::Migrate,
                TaskId::GenerateBindings,
                TaskId::Seed,
            ],
            true,
        );

        let mut map = BTreeMap::new();
        map.insert(ChangeKind::MigrationSource, schema.clone());
        map.insert(ChangeKind::SchemaDefinition, schema);
        map.insert(
            ChangeKind::ApiSchema,
            RebuildPipeline::new(
                &[TaskId::GenerateBindings, TaskId::MergeFrontendSchema],
                true,
            ),
        );
        map.insert(
            ChangeKind::SeedSource,
            RebuildPipeline::new(&[TaskId::Seed], false),
        );
        map.insert(ChangeKind::ServerSource, RebuildPipeline::new(&[], true));

        Self { map }
    }

    /// Return a table with `kind` mapped to `pipeline`. Inert kinds are
    /// ignored.
    pub fn with_pipeline(mut self, kind: ChangeKind, pipeline: RebuildPipeline) -> Self {
        if kind.is_actionable() {
            self.map.insert(kind, pipeline);
        }
        self
    }

    pub fn get(&self, kind: ChangeKind) -> Option<&RebuildPipeline> {
        self.map.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChangeKind, &RebuildPipeline)> {
        self.map.iter().map(|(k, p)| (*k, p))
    }
}
