// tests/quit_signals.rs
#![cfg(unix)]

use devloop::signals::forward_quit_signals;
use devloop::supervisor::shutdown_signal;
use devloop_test_utils::{init_tracing, with_timeout};

fn send_to_self(signal: &str) {
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("kill -{signal} {}", std::process::id()))
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn sigterm_fires_the_shutdown() {
    init_tracing();
    let (trigger, mut shutdown) = shutdown_signal();
    let listener = forward_quit_signals(trigger).unwrap();

    send_to_self("TERM");

    with_timeout(shutdown.wait()).await;
    with_timeout(listener).await.unwrap();
}

#[tokio::test]
async fn sighup_fires_the_shutdown() {
    init_tracing();
    let (trigger, mut shutdown) = shutdown_signal();
    let listener = forward_quit_signals(trigger).unwrap();

    send_to_self("HUP");

    with_timeout(shutdown.wait()).await;
    with_timeout(listener).await.unwrap();
}
