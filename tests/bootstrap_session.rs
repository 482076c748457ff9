// tests/bootstrap_session.rs
#![cfg(unix)]

use std::fs;
use std::time::Duration;

use devloop::bootstrap::Session;
use devloop::config::ConfigFile;
use devloop::errors::DevloopError;
use devloop::notification::Notifier;
use devloop::supervisor::shutdown_signal;
use devloop::types::TaskId;
use devloop_test_utils::{
    ConfigBuilder, ControlEvent, FakeProcessControl, FakeTaskRunner, init_tracing, with_timeout,
};

const BOOT_TASKS: [TaskId; 7] = [
    TaskId::InstallDeps,
    TaskId::DatabaseUp,
    TaskId::ResetSchema,
    TaskId::Migrate,
    TaskId::GenerateBindings,
    TaskId::MergeFrontendSchema,
    TaskId::Seed,
];

fn session_config(db_port: u16) -> ConfigFile {
    ConfigBuilder::new()
        .quiet_window_ms(150)
        .server("sleep 30", 18_766)
        .database_retry_ms(20)
        .env("DATABASE_USER", "root")
        .env("DATABASE_PASSWORD", "secret")
        .env("DATABASE_HOST", "127.0.0.1")
        .env("DATABASE_PORT", &db_port.to_string())
        .env("DATABASE_NAME", "app")
        .build()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

#[tokio::test]
async fn boots_then_rebuilds_and_restarts_on_a_migration_change() {
    init_tracing();
    let db = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let db_port = db.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("migrations")).unwrap();

    let runner = FakeTaskRunner::new();
    let control = FakeProcessControl::killing();
    let (trigger, shutdown) = shutdown_signal();

    let session = Session::new(session_config(db_port), root.clone(), Notifier::disabled());
    let handle = tokio::spawn(session.run(runner.clone(), control.clone(), shutdown));

    wait_until(|| {
        control
            .events()
            .contains(&ControlEvent::FreePort(18_766))
    })
    .await;
    assert_eq!(runner.calls(), BOOT_TASKS.to_vec());
    tokio::time::sleep(Duration::from_millis(200)).await;

    runner.clear();
    fs::write(root.join("migrations/0001_init.sql"), "create table t();").unwrap();

    wait_until(|| {
        control
            .events()
            .iter()
            .any(|e| matches!(e, ControlEvent::TerminateTree(_)))
            && control.events().iter().filter(|e| matches!(e, ControlEvent::FreePort(_))).count() >= 3
    })
    .await;
    assert_eq!(
        runner.calls(),
        vec![
            TaskId::ResetSchema,
            TaskId::Migrate,
            TaskId::GenerateBindings,
            TaskId::Seed
        ]
    );

    trigger.fire();
    let restarts = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(restarts, 1);
}

#[tokio::test]
async fn failed_bootstrap_step_is_fatal_and_never_starts_the_server() {
    init_tracing();
    let db = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let db_port = db.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();

    let runner = FakeTaskRunner::new();
    runner.fail(TaskId::Migrate, 1);
    let control = FakeProcessControl::new();
    let (_trigger, shutdown) = shutdown_signal();

    let session = Session::new(
        session_config(db_port),
        dir.path().to_path_buf(),
        Notifier::disabled(),
    );
    let err = with_timeout(session.run(runner.clone(), control.clone(), shutdown))
        .await
        .unwrap_err();

    assert!(matches!(err, DevloopError::TaskFailed { ref task, .. } if task == "migrate"));
    assert_eq!(
        runner.calls(),
        vec![
            TaskId::InstallDeps,
            TaskId::DatabaseUp,
            TaskId::ResetSchema,
            TaskId::Migrate
        ]
    );
    assert!(control.events().is_empty());
}

#[tokio::test]
async fn missing_database_setting_is_fatal() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = session_config(1);
    cfg.env.remove("DATABASE_PASSWORD");
    // Keep a value in the real environment from masking the removal.
    cfg.database.required_env = vec!["DEVLOOP_TEST_SURELY_UNSET_PASSWORD".to_string()];

    let runner = FakeTaskRunner::new();
    let (_trigger, shutdown) = shutdown_signal();
    let session = Session::new(cfg, dir.path().to_path_buf(), Notifier::disabled());

    let err = with_timeout(session.run(runner.clone(), FakeProcessControl::new(), shutdown))
        .await
        .unwrap_err();

    assert!(
        matches!(err, DevloopError::MissingEnv(ref name) if name == "DEVLOOP_TEST_SURELY_UNSET_PASSWORD")
    );
    assert_eq!(runner.calls(), vec![TaskId::InstallDeps, TaskId::DatabaseUp]);
}

#[tokio::test]
async fn quitting_while_waiting_for_the_database_exits_cleanly() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let runner = FakeTaskRunner::new();
    let control = FakeProcessControl::new();
    let (trigger, shutdown) = shutdown_signal();

    // Port 1 refuses connections, so the database wait never finishes.
    let session = Session::new(session_config(1), dir.path().to_path_buf(), Notifier::disabled());
    let handle = tokio::spawn(session.run(runner.clone(), control.clone(), shutdown));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());
    trigger.fire();

    let restarts = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(restarts, 0);
    assert_eq!(runner.calls(), vec![TaskId::InstallDeps, TaskId::DatabaseUp]);
    assert!(control.events().is_empty());
}
