// src/watch/mod.rs

//! File watching and change classification.
//!
//! This module is responsible for:
//! - Registering every non-excluded directory with `notify`.
//! - Classifying changed paths into a [`crate::types::ChangeKind`].
//! - Dropping writes that did not change a file's content.
//!
//! It does **not** run anything; it only feeds the debouncer.

pub mod aggregator;
pub mod classify;
pub mod hash;
pub mod path_utils;

pub use aggregator::{WatchAggregator, is_write_event};
pub use classify::PathClassifier;
pub use hash::{ContentCache, compute_file_hash, fingerprint_tree};
