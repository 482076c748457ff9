// src/watch/aggregator.rs

//! Watch aggregator.
//!
//! Owns the file-system watcher. Directories are registered one by one
//! (non-recursively) so excluded subtrees are never watched at all; the
//! exclusion check happens at registration time, not per event.
//!
//! Each write-type event is classified and, when actionable, handed to the
//! debouncer.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::config::ConfigFile;
use crate::engine::debounce::DebounceHandle;
use crate::errors::{DevloopError, Result};
use crate::notification::Notifier;
use crate::types::ChangeKind;
use crate::watch::classify::{PathClassifier, build_globset};
use crate::watch::hash::ContentCache;
use crate::watch::path_utils::{relative_str, slashed};

/// A path outside the root that is watched explicitly.
#[derive(Debug, Clone)]
struct ExtraTarget {
    path: PathBuf,
    kind: Option<ChangeKind>,
}

/// Whether an event kind represents a content write.
///
/// Creations, data writes (including truncation) and renames onto a path
/// count. Metadata/permission changes, reads and removals do not.
pub fn is_write_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}

pub struct WatchAggregator {
    root: PathBuf,
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    classifier: PathClassifier,
    exclude: GlobSet,
    extras: Vec<ExtraTarget>,
    cache: Option<ContentCache>,
    notifier: Notifier,
    registered: usize,
}

impl std::fmt::Debug for WatchAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchAggregator")
            .field("root", &self.root)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl WatchAggregator {
    /// Create the watcher and register the root tree plus every
    /// `[[watch.extra]]` path.
    ///
    /// Any registration failure is returned as an error: a partially watched
    /// tree would silently miss changes.
    pub fn new(cfg: &ConfigFile, root: &Path, notifier: Notifier) -> Result<Self> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        // Channel from the synchronous notify callback into the async world.
        let (event_tx, events) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away on shutdown.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .map_err(|source| DevloopError::WatchRegistration {
            path: root.clone(),
            source,
        })?;

        let extras = cfg
            .watch
            .extra
            .iter()
            .map(|e| ExtraTarget {
                path: if e.path.is_absolute() {
                    e.path.clone()
                } else {
                    root.join(&e.path)
                },
                kind: e.kind,
            })
            .collect();

        let mut aggregator = Self {
            classifier: PathClassifier::from_config(&cfg.watch)?,
            exclude: build_globset(&cfg.watch.exclude)?,
            cache: cfg.project.skip_unchanged.then(ContentCache::new),
            root,
            watcher,
            events,
            extras,
            notifier,
            registered: 0,
        };

        let root = aggregator.root.clone();
        aggregator.register_tree(&root)?;
        aggregator.register_extras()?;

        info!(
            root = ?aggregator.root,
            directories = aggregator.registered,
            "file watcher started"
        );
        Ok(aggregator)
    }

    /// Handle on the content-hash table, when unchanged writes are dropped.
    pub fn content_cache(&self) -> Option<ContentCache> {
        self.cache.clone()
    }

    /// Number of registered watch targets.
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Consume watcher events until the debouncer goes away.
    pub async fn run(mut self, debounce: DebounceHandle<ChangeKind>) {
        while let Some(res) = self.events.recv().await {
            match res {
                Ok(event) => {
                    for kind in self.handle_event(&event) {
                        if !debounce.schedule(kind) {
                            debug!("debouncer gone; stopping watch aggregator");
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "file watch error");
                    self.notifier
                        .error("devloop: file watch error", &err.to_string());
                }
            }
        }
        debug!("watch event stream ended");
    }

    /// Classify one raw event, returning the actionable kinds it produced.
    fn handle_event(&mut self, event: &Event) -> Vec<ChangeKind> {
        trace!(?event, "received notify event");

        if !is_write_event(&event.kind) {
            return Vec::new();
        }

        let mut kinds = Vec::new();
        for path in &event.paths {
            if matches!(event.kind, EventKind::Create(CreateKind::Folder)) || path.is_dir() {
                self.register_new_dir(path);
                continue;
            }

            let kind = self.classify_path(path);
            if !kind.is_actionable() {
                trace!(path = ?path, kind = %kind, "ignoring change");
                continue;
            }

            if let Some(cache) = &self.cache {
                if !cache.changed(path) {
                    debug!(path = ?path, "content unchanged; ignoring write");
                    continue;
                }
            }

            debug!(path = ?path, kind = %kind, "change classified");
            kinds.push(kind);
        }
        kinds
    }

    fn classify_path(&self, path: &Path) -> ChangeKind {
        if let Some(rel) = relative_str(&self.root, path) {
            return self.classifier.classify(&rel);
        }

        for extra in &self.extras {
            if path.starts_with(&extra.path) {
                return extra
                    .kind
                    .unwrap_or_else(|| self.classifier.classify(&slashed(path)));
            }
        }

        warn!(
            "could not relativize path {:?} against root {:?}",
            path, self.root
        );
        ChangeKind::Irrelevant
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        match relative_str(&self.root, dir) {
            Some(rel) if !rel.is_empty() => self.exclude.is_match(&rel),
            _ => false,
        }
    }

    /// Register `top` and every non-excluded directory below it.
    fn register_tree(&mut self, top: &Path) -> Result<()> {
        let dirs: Vec<PathBuf> = WalkDir::new(top)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir() && !self.is_excluded(e.path()))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry.into_path()),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory");
                    None
                }
            })
            .collect();

        for dir in dirs {
            self.watch_path(&dir, RecursiveMode::NonRecursive)?;
        }
        Ok(())
    }

    fn register_extras(&mut self) -> Result<()> {
        let targets: Vec<PathBuf> = self.extras.iter().map(|e| e.path.clone()).collect();
        for path in targets {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            self.watch_path(&path, mode)?;
        }
        Ok(())
    }

    fn watch_path(&mut self, path: &Path, mode: RecursiveMode) -> Result<()> {
        self.watcher
            .watch(path, mode)
            .map_err(|source| DevloopError::WatchRegistration {
                path: path.to_path_buf(),
                source,
            })?;
        trace!(path = ?path, "registered watch");
        self.registered += 1;
        Ok(())
    }

    /// Directories created after startup are registered on the fly. Failure
    /// here is recoverable: startup already succeeded.
    fn register_new_dir(&mut self, dir: &Path) {
        if relative_str(&self.root, dir).is_none() || self.is_excluded(dir) {
            return;
        }
        if let Err(err) = self.register_tree(dir) {
            warn!(dir = ?dir, error = %err, "failed to watch new directory");
            self.notifier
                .error("devloop: cannot watch new directory", &err.to_string());
        } else {
            debug!(dir = ?dir, "watching new directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn writes_and_creations_count() {
        assert!(is_write_event(&EventKind::Create(CreateKind::File)));
        assert!(is_write_event(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_write_event(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_write_event(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
    }

    #[test]
    fn metadata_reads_and_removals_do_not() {
        assert!(!is_write_event(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!is_write_event(&EventKind::Access(AccessKind::Any)));
        assert!(!is_write_event(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_write_event(&EventKind::Modify(ModifyKind::Name(
            RenameMode::From
        ))));
    }
}
