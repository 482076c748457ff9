// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What a changed path means for the development loop.
///
/// Exactly one kind is assigned per event by
/// [`PathClassifier`](crate::watch::PathClassifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Plain `.sql` outside the migrations tree.
    SchemaDefinition,
    /// Interface-definition file (`.graphql`, `.graphqls`, ...).
    ApiSchema,
    /// Anything under a `seed/` directory.
    SeedSource,
    /// General server source or an env file.
    ServerSource,
    /// Anything under a `migrations/` directory.
    MigrationSource,
    /// Output of a previous generation step. Never acted on.
    GeneratedArtifact,
    Irrelevant,
}

impl ChangeKind {
    /// Kinds that have a rebuild pipeline.
    pub const ACTIONABLE: [ChangeKind; 5] = [
        ChangeKind::MigrationSource,
        ChangeKind::SchemaDefinition,
        ChangeKind::ApiSchema,
        ChangeKind::SeedSource,
        ChangeKind::ServerSource,
    ];

    /// Whether a change of this kind should ever reach the dispatcher.
    pub fn is_actionable(self) -> bool {
        !matches!(self, ChangeKind::GeneratedArtifact | ChangeKind::Irrelevant)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::SchemaDefinition => "schema_definition",
            ChangeKind::ApiSchema => "api_schema",
            ChangeKind::SeedSource => "seed_source",
            ChangeKind::ServerSource => "server_source",
            ChangeKind::MigrationSource => "migration_source",
            ChangeKind::GeneratedArtifact => "generated_artifact",
            ChangeKind::Irrelevant => "irrelevant",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "schema_definition" => Ok(ChangeKind::SchemaDefinition),
            "api_schema" => Ok(ChangeKind::ApiSchema),
            "seed_source" => Ok(ChangeKind::SeedSource),
            "server_source" => Ok(ChangeKind::ServerSource),
            "migration_source" => Ok(ChangeKind::MigrationSource),
            "generated_artifact" => Ok(ChangeKind::GeneratedArtifact),
            "irrelevant" => Ok(ChangeKind::Irrelevant),
            other => Err(format!("unknown change kind: {other}")),
        }
    }
}

/// Whether a server instance is the first one of this session or a
/// replacement started by the restart loop.
///
/// Forwarded to the server so it can skip one-time setup on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    FirstBoot,
    Restart,
}

impl BootMode {
    pub fn is_restart(self) -> bool {
        matches!(self, BootMode::Restart)
    }
}

/// External tasks the development loop knows how to invoke.
///
/// Each id maps to one shell command in the `[tasks]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskId {
    InstallDeps,
    DatabaseUp,
    ResetSchema,
    Migrate,
    GenerateBindings,
    MergeFrontendSchema,
    Seed,
}

impl TaskId {
    pub const ALL: [TaskId; 7] = [
        TaskId::InstallDeps,
        TaskId::DatabaseUp,
        TaskId::ResetSchema,
        TaskId::Migrate,
        TaskId::GenerateBindings,
        TaskId::MergeFrontendSchema,
        TaskId::Seed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskId::InstallDeps => "install_deps",
            TaskId::DatabaseUp => "database_up",
            TaskId::ResetSchema => "reset_schema",
            TaskId::Migrate => "migrate",
            TaskId::GenerateBindings => "generate_bindings",
            TaskId::MergeFrontendSchema => "merge_frontend_schema",
            TaskId::Seed => "seed",
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
