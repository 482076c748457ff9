use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::errors::Result;
use devloop::supervisor::{LifecycleFuture, ServerLifecycle};
use devloop::types::BootMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start(BootMode),
    Stop,
}

#[derive(Debug, Default)]
struct State {
    events: Vec<LifecycleEvent>,
    running: bool,
    overlaps: usize,
}

/// In-memory [`ServerLifecycle`] that records starts and stops.
///
/// A start while an instance is still "running" is counted as an overlap.
/// Every start takes `start_delay`, which gives tests a window to send more
/// restart requests mid-restart.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
    start_delay: Duration,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn starts(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::Start(_)))
            .count()
    }

    pub fn overlaps(&self) -> usize {
        self.state.lock().unwrap().overlaps
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }
}

impl ServerLifecycle for FakeServer {
    fn start(&mut self, mode: BootMode) -> LifecycleFuture<'_> {
        Box::pin(async move {
            tokio::time::sleep(self.start_delay).await;
            let mut state = self.state.lock().unwrap();
            if state.running {
                state.overlaps += 1;
            }
            state.running = true;
            state.events.push(LifecycleEvent::Start(mode));
            Result::Ok(())
        })
    }

    fn stop(&mut self) -> LifecycleFuture<'_> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.running = false;
            state.events.push(LifecycleEvent::Stop);
            Ok(())
        })
    }
}
