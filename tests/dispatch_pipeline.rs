// tests/dispatch_pipeline.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use devloop::config::{ConfigFile, TasksSection};
use devloop::engine::{DispatchOutcome, Dispatcher, PipelineTable};
use devloop::exec::TaskTable;
use devloop::notification::Notifier;
use devloop::supervisor::{RestartReceiver, restart_channel};
use devloop::types::{ChangeKind, TaskId};
use devloop_test_utils::{ConfigBuilder, FakeTaskRunner, init_tracing};

fn dispatcher_for(
    pipelines: PipelineTable,
    tasks: TasksSection,
    runner: FakeTaskRunner,
) -> (Dispatcher<FakeTaskRunner>, RestartReceiver) {
    let (restart, rx) = restart_channel();
    let mut env = BTreeMap::new();
    env.insert("COMPOSE_PROJECT_NAME".to_string(), "acme-shop".to_string());
    let table = TaskTable::new(tasks, PathBuf::from("."), env);
    (
        Dispatcher::new(pipelines, table, runner, restart, Notifier::disabled()),
        rx,
    )
}

fn default_dispatcher(runner: FakeTaskRunner) -> (Dispatcher<FakeTaskRunner>, RestartReceiver) {
    let cfg = ConfigFile::default();
    dispatcher_for(cfg.pipelines, cfg.tasks, runner)
}

#[tokio::test]
async fn migration_change_runs_four_steps_then_requests_one_restart() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    let (dispatcher, mut rx) = default_dispatcher(runner.clone());

    let outcome = dispatcher.dispatch(ChangeKind::MigrationSource).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Completed {
            restart_requested: true
        }
    );
    assert_eq!(
        runner.calls(),
        vec![
            TaskId::ResetSchema,
            TaskId::Migrate,
            TaskId::GenerateBindings,
            TaskId::Seed
        ]
    );
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err(), "exactly one restart request");
}

#[tokio::test]
async fn server_source_change_only_restarts() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    let (dispatcher, mut rx) = default_dispatcher(runner.clone());

    let outcome = dispatcher.dispatch(ChangeKind::ServerSource).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Completed {
            restart_requested: true
        }
    );
    assert!(runner.calls().is_empty());
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn failing_migrate_aborts_and_keeps_the_server() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    runner.fail(TaskId::Migrate, 1);
    let (dispatcher, mut rx) = default_dispatcher(runner.clone());

    let outcome = dispatcher.dispatch(ChangeKind::MigrationSource).await;

    match outcome {
        DispatchOutcome::Aborted { task, error } => {
            assert_eq!(task, TaskId::Migrate);
            assert!(error.contains("exit code 1"), "unexpected error: {error}");
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert_eq!(runner.calls(), vec![TaskId::ResetSchema, TaskId::Migrate]);
    assert!(rx.try_recv().is_err(), "no restart after a failed step");
}

#[tokio::test]
async fn seed_change_runs_seed_without_restart() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    let (dispatcher, mut rx) = default_dispatcher(runner.clone());

    let outcome = dispatcher.dispatch(ChangeKind::SeedSource).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Completed {
            restart_requested: false
        }
    );
    assert_eq!(runner.calls(), vec![TaskId::Seed]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn inert_kinds_are_ignored() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    let (dispatcher, mut rx) = default_dispatcher(runner.clone());

    for kind in [ChangeKind::GeneratedArtifact, ChangeKind::Irrelevant] {
        assert_eq!(dispatcher.dispatch(kind).await, DispatchOutcome::Ignored);
    }
    assert!(runner.calls().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn back_to_back_pipelines_leave_a_single_pending_restart() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    let (dispatcher, mut rx) = default_dispatcher(runner.clone());

    dispatcher.dispatch(ChangeKind::ServerSource).await;
    dispatcher.dispatch(ChangeKind::ApiSchema).await;

    assert_eq!(
        runner.calls(),
        vec![TaskId::GenerateBindings, TaskId::MergeFrontendSchema]
    );
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn disabled_tasks_are_skipped_and_non_fatal_failures_continue() {
    init_tracing();
    let mut raw = ConfigBuilder::new()
        .task(TaskId::MergeFrontendSchema, "")
        .raw();
    raw.pipeline.insert(
        "api_schema".to_string(),
        toml::from_str(
            r#"
steps = [{ task = "generate_bindings", fatal = false }, "merge_frontend_schema", "seed"]
restart = true
"#,
        )
        .unwrap(),
    );
    let cfg = ConfigFile::try_from(raw).unwrap();

    let runner = FakeTaskRunner::new();
    runner.fail(TaskId::GenerateBindings, 2);
    let (dispatcher, mut rx) = dispatcher_for(cfg.pipelines, cfg.tasks, runner.clone());

    let outcome = dispatcher.dispatch(ChangeKind::ApiSchema).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Completed {
            restart_requested: true
        }
    );
    // merge_frontend_schema is disabled, so the runner never sees it.
    assert_eq!(runner.calls(), vec![TaskId::GenerateBindings, TaskId::Seed]);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn tasks_receive_the_session_environment() {
    init_tracing();
    let runner = FakeTaskRunner::new();
    let (dispatcher, _rx) = default_dispatcher(runner.clone());

    dispatcher.dispatch(ChangeKind::SeedSource).await;

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(
        invocations[0].env.get("COMPOSE_PROJECT_NAME").map(String::as_str),
        Some("acme-shop")
    );
    assert_eq!(invocations[0].cmd, TasksSection::default().seed);
}
