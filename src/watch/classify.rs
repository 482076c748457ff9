// src/watch/classify.rs

//! Path classifier: changed path → [`ChangeKind`].
//!
//! Pure and total. Rules are checked in this order and the first match wins:
//!
//! 1. generated output (glob match, or file name with a generated prefix)
//! 2. a `migrations/` path segment
//! 3. `.sql` extension
//! 4. interface-definition extension (`.graphql`, ...)
//! 5. a `seed/` path segment
//! 6. server source extension, or an env file (`.env`, `.env.*`)
//!
//! Generated output comes first so the loop never re-triggers on files its
//! own pipeline just wrote.

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchSection;
use crate::errors::Result;
use crate::types::ChangeKind;

#[derive(Debug, Clone)]
pub struct PathClassifier {
    generated: GlobSet,
    generated_prefixes: Vec<String>,
    source_extensions: Vec<String>,
    api_schema_extensions: Vec<String>,
}

impl PathClassifier {
    pub fn from_config(watch: &WatchSection) -> Result<Self> {
        Ok(Self {
            generated: build_globset(&watch.generated)?,
            generated_prefixes: watch.generated_prefixes.clone(),
            source_extensions: lowercase_all(&watch.source_extensions),
            api_schema_extensions: lowercase_all(&watch.api_schema_extensions),
        })
    }

    /// Classify `path`, given relative to the watched root with forward
    /// slashes (absolute paths are accepted for files outside the root).
    pub fn classify(&self, path: &str) -> ChangeKind {
        let path = normalize(path);
        let file_name = path.rsplit('/').next().unwrap_or(path.as_str());
        let ext = extension(file_name);

        if self.is_generated(&path, file_name) {
            return ChangeKind::GeneratedArtifact;
        }

        let padded = format!("/{path}");
        if padded.contains("/migrations/") {
            return ChangeKind::MigrationSource;
        }
        if ext.as_deref() == Some("sql") {
            return ChangeKind::SchemaDefinition;
        }
        if ext.as_ref().is_some_and(|e| self.api_schema_extensions.contains(e)) {
            return ChangeKind::ApiSchema;
        }
        if padded.contains("/seed/") {
            return ChangeKind::SeedSource;
        }
        if ext.as_ref().is_some_and(|e| self.source_extensions.contains(e)) || is_env_file(file_name) {
            return ChangeKind::ServerSource;
        }

        ChangeKind::Irrelevant
    }

    fn is_generated(&self, path: &str, file_name: &str) -> bool {
        self.generated.is_match(path)
            || self
                .generated_prefixes
                .iter()
                .any(|p| !p.is_empty() && file_name.starts_with(p.as_str()))
    }
}

pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build().context("building glob set")?)
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}

fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn is_env_file(file_name: &str) -> bool {
    file_name == ".env" || file_name.starts_with(".env.")
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PathClassifier {
        PathClassifier::from_config(&WatchSection::default()).unwrap()
    }

    #[test]
    fn migrations_segment_beats_sql_extension() {
        let c = classifier();
        assert_eq!(
            c.classify("migrations/0007_add_index.sql"),
            ChangeKind::MigrationSource
        );
        assert_eq!(
            c.classify("db/migrations/0001_init.sql"),
            ChangeKind::MigrationSource
        );
        assert_eq!(c.classify("schema/views.sql"), ChangeKind::SchemaDefinition);
    }

    #[test]
    fn generated_output_wins_regardless_of_extension() {
        let c = classifier();
        assert_eq!(c.classify("models/users.go"), ChangeKind::GeneratedArtifact);
        assert_eq!(
            c.classify("graph/generated/schema.graphql"),
            ChangeKind::GeneratedArtifact
        );
        assert_eq!(
            c.classify("graph/generated.go"),
            ChangeKind::GeneratedArtifact
        );
        assert_eq!(
            c.classify("migrations/zz_generated_0001.sql"),
            ChangeKind::GeneratedArtifact
        );
    }

    #[test]
    fn api_schema_seed_and_source() {
        let c = classifier();
        assert_eq!(c.classify("graph/schema.graphql"), ChangeKind::ApiSchema);
        assert_eq!(
            c.classify("/home/me/frontend/schema_custom.graphql"),
            ChangeKind::ApiSchema
        );
        assert_eq!(c.classify("cmd/seed/main.go"), ChangeKind::SeedSource);
        assert_eq!(c.classify("seed/users.json"), ChangeKind::SeedSource);
        assert_eq!(
            c.classify("src/server/handler.go"),
            ChangeKind::ServerSource
        );
        assert_eq!(c.classify(".env"), ChangeKind::ServerSource);
        assert_eq!(c.classify("config/.env.local"), ChangeKind::ServerSource);
    }

    #[test]
    fn everything_else_is_irrelevant() {
        let c = classifier();
        assert_eq!(c.classify("README.md"), ChangeKind::Irrelevant);
        assert_eq!(c.classify(".envrc"), ChangeKind::Irrelevant);
        assert_eq!(c.classify(".go"), ChangeKind::Irrelevant);
        assert_eq!(c.classify(""), ChangeKind::Irrelevant);
    }

    #[test]
    fn windows_separators_and_dot_prefix_are_normalized() {
        let c = classifier();
        assert_eq!(
            c.classify(r"migrations\0002.sql"),
            ChangeKind::MigrationSource
        );
        assert_eq!(c.classify("./main.go"), ChangeKind::ServerSource);
        assert_eq!(c.classify("./models/user.go"), ChangeKind::GeneratedArtifact);
    }
}
