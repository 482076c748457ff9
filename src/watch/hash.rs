// src/watch/hash.rs

//! Content hashing: per-file change suppression and tree fingerprints.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use blake3::Hasher;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::Result;

/// Hash the contents of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut hasher = Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Deterministic fingerprint of every regular file under `root`.
///
/// Relative paths and contents both feed the hash, in sorted path order, so
/// a rename changes the fingerprint as well as an edit. A missing `root`
/// fingerprints as the empty tree.
pub fn fingerprint_tree(root: &Path) -> Result<String> {
    let mut files: Vec<PathBuf> = Vec::new();
    if root.exists() {
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.with_context(|| format!("walking {:?}", root))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();

    let mut hasher = Hasher::new();
    for path in &files {
        let rel = path.strip_prefix(root).unwrap_or(path);
        hasher.update(rel.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update(&[0]);
        hasher.update(compute_file_hash(path)?.as_bytes());
        hasher.update(&[b'\n']);
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(root = ?root, files = files.len(), hash = %hash, "computed tree fingerprint");
    Ok(hash)
}

/// Last seen content hash per file.
///
/// Used to drop write events that did not change a file's content (editors
/// rewriting an unchanged buffer, `touch`). Clones share one table, so the
/// dispatcher side can forget hashes after a failed rebuild.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    hashes: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.hashes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns false only when `path` hashes to the same value it had the
    /// last time it was seen. Unreadable paths always count as changed.
    pub fn changed(&self, path: &Path) -> bool {
        match compute_file_hash(path) {
            Ok(hash) => {
                let mut table = self.table();
                match table.get(path) {
                    Some(old) if *old == hash => false,
                    _ => {
                        table.insert(path.to_path_buf(), hash);
                        true
                    }
                }
            }
            Err(_) => {
                self.invalidate(path);
                true
            }
        }
    }

    pub fn invalidate(&self, path: &Path) {
        if self.table().remove(path).is_some() {
            debug!("invalidated content hash for {:?}", path);
        }
    }

    /// Forget every hash; the next write to any file counts as a change.
    pub fn clear(&self) {
        let mut table = self.table();
        debug!(entries = table.len(), "clearing content hashes");
        table.clear();
    }
}
