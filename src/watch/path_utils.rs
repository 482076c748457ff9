// src/watch/path_utils.rs

//! Path helpers shared by the watch aggregator.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a plain `strip_prefix` first and falls back to comparing
/// canonicalized paths (symlinked roots, `/private/var` on macOS). Returns
/// `None` for paths outside `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slashed(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(slashed(rel));
        }
    }

    None
}

/// Lossy string form of `path` with forward slashes.
pub fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_under_root_are_relativized() {
        let root = Path::new("/proj/backend");
        assert_eq!(
            relative_str(root, Path::new("/proj/backend/migrations/0001.sql")).as_deref(),
            Some("migrations/0001.sql")
        );
        assert_eq!(relative_str(root, root).as_deref(), Some(""));
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let root = Path::new("/proj/backend");
        assert_eq!(
            relative_str(root, Path::new("/proj/frontend/schema.graphql")),
            None
        );
    }
}
