// src/config/project.rs

//! Project identity derived from the working directory.

use std::path::{Component, Path};

/// Name used to namespace per-project resources (the database container).
///
/// Checkouts under a `github.com/<org>/<project>` layout get `<org>-<project>`;
/// anything else falls back to the last directory name, or `devloop`.
pub fn project_name(dir: &Path) -> String {
    let parts: Vec<String> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(idx) = parts.iter().position(|p| p == "github.com") {
        if let (Some(org), Some(project)) = (parts.get(idx + 1), parts.get(idx + 2)) {
            return format!("{org}-{project}");
        }
    }

    parts
        .last()
        .cloned()
        .unwrap_or_else(|| "devloop".to_string())
}
