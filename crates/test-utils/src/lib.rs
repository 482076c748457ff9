pub mod builders;
pub mod fake_control;
pub mod fake_runner;
pub mod fake_server;

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

pub use builders::ConfigBuilder;
pub use fake_control::{ControlEvent, FakeProcessControl};
pub use fake_runner::FakeTaskRunner;
pub use fake_server::{FakeServer, LifecycleEvent};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `DEVLOOP_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("DEVLOOP_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}
