// tests/watch_aggregator.rs

use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;

use devloop::config::ConfigFile;
use devloop::engine::Debouncer;
use devloop::errors::DevloopError;
use devloop::notification::Notifier;
use devloop::types::ChangeKind;
use devloop::watch::WatchAggregator;
use devloop_test_utils::{ConfigBuilder, init_tracing, with_timeout};

/// Start the aggregator and a short-window debouncer that forwards every
/// fired kind to the returned receiver.
fn start(cfg: &ConfigFile, root: &Path) -> (usize, mpsc::UnboundedReceiver<ChangeKind>) {
    let aggregator = WatchAggregator::new(cfg, root, Notifier::disabled()).unwrap();
    let registered = aggregator.registered();

    let (debouncer, handle) = Debouncer::new(Duration::from_millis(50));
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(aggregator.run(handle));
    tokio::spawn(debouncer.run(move |kind| {
        let _ = tx.send(kind);
        async {}
    }));

    (registered, rx)
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["migrations", "seed", "cmd/server", "models", ".git/objects"] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
    }
    dir
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn excluded_directories_are_never_registered() {
    init_tracing();
    let dir = project();
    let cfg = ConfigBuilder::new().build();

    let aggregator = WatchAggregator::new(&cfg, dir.path(), Notifier::disabled()).unwrap();

    // root, migrations, seed, cmd, cmd/server
    assert_eq!(aggregator.registered(), 5);
}

#[tokio::test]
async fn migration_write_is_classified_and_forwarded() {
    init_tracing();
    let dir = project();
    let cfg = ConfigBuilder::new().build();
    let (_, mut rx) = start(&cfg, dir.path());
    settle().await;

    fs::write(dir.path().join("migrations/0002_users.sql"), "create table users();").unwrap();

    let kind = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(kind, ChangeKind::MigrationSource);
}

#[tokio::test]
async fn generated_files_do_not_trigger_anything() {
    init_tracing();
    let dir = project();
    let cfg = ConfigBuilder::new().build();
    let (_, mut rx) = start(&cfg, dir.path());
    settle().await;

    fs::write(dir.path().join("cmd/server/zz_generated_routes.go"), "package server").unwrap();
    settle().await;
    fs::write(dir.path().join("cmd/server/main.go"), "package main").unwrap();

    let kind = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(kind, ChangeKind::ServerSource);
    settle().await;
    assert!(rx.try_recv().is_err(), "generated write leaked through");
}

#[tokio::test]
async fn directories_created_later_are_watched() {
    init_tracing();
    let dir = project();
    let cfg = ConfigBuilder::new().build();
    let (_, mut rx) = start(&cfg, dir.path());
    settle().await;

    fs::create_dir(dir.path().join("internal")).unwrap();
    settle().await;
    // Drain anything the directory creation itself produced.
    while rx.try_recv().is_ok() {}

    fs::write(dir.path().join("internal/handler.go"), "package internal").unwrap();
    let kind = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(kind, ChangeKind::ServerSource);
}

#[tokio::test]
async fn extra_paths_outside_the_root_use_their_kind() {
    init_tracing();
    let dir = project();
    let shared = tempfile::tempdir().unwrap();
    let schema = shared.path().join("schema.graphql");
    fs::write(&schema, "type Query { ok: Boolean }").unwrap();

    let cfg = ConfigBuilder::new()
        .extra_watch(&schema, Some(ChangeKind::ApiSchema))
        .build();
    let (registered, mut rx) = start(&cfg, dir.path());
    assert_eq!(registered, 6);
    settle().await;

    fs::write(&schema, "type Query { ok: Boolean, version: String }").unwrap();
    let kind = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(kind, ChangeKind::ApiSchema);
}

#[tokio::test]
async fn missing_extra_path_is_a_registration_error() {
    init_tracing();
    let dir = project();
    let cfg = ConfigBuilder::new()
        .extra_watch(dir.path().join("does/not/exist.graphql"), None)
        .build();

    let err = WatchAggregator::new(&cfg, dir.path(), Notifier::disabled()).unwrap_err();
    assert!(matches!(err, DevloopError::WatchRegistration { .. }));
}
