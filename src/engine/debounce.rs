// src/engine/debounce.rs

//! Debounce coalescer.
//!
//! A burst of `schedule` calls inside one quiet window collapses into a
//! single trailing invocation carrying the *last* scheduled action. Earlier
//! actions of the burst are dropped.
//!
//! The timing logic is the pure [`DebounceState`] machine; [`Debouncer`] is
//! the single task that owns it, so schedule calls (messages) and timer expiry
//! can never race.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

/// Idle, or armed with one pending action and a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState<T> {
    Idle,
    Armed { pending: T, deadline: Instant },
}

impl<T> Default for DebounceState<T> {
    fn default() -> Self {
        DebounceState::Idle
    }
}

impl<T> DebounceState<T> {
    /// Record `action` as the pending one and restart the window at `now`.
    ///
    /// Returns the action that was overwritten, if any.
    pub fn schedule(&mut self, action: T, now: Instant, window: Duration) -> Option<T> {
        let previous = std::mem::replace(
            self,
            DebounceState::Armed {
                pending: action,
                deadline: now + window,
            },
        );
        match previous {
            DebounceState::Idle => None,
            DebounceState::Armed { pending, .. } => Some(pending),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            DebounceState::Idle => None,
            DebounceState::Armed { deadline, .. } => Some(*deadline),
        }
    }

    /// Take the pending action if its window has elapsed at `now`,
    /// returning to `Idle`.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if now >= deadline => match std::mem::take(self) {
                DebounceState::Armed { pending, .. } => Some(pending),
                DebounceState::Idle => None,
            },
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DebounceState::Idle)
    }
}

/// Cheap, cloneable handle used by producers to schedule actions.
#[derive(Debug)]
pub struct DebounceHandle<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for DebounceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> DebounceHandle<T> {
    /// Schedule `action`, replacing whatever is pending and restarting the
    /// quiet window.
    ///
    /// Returns false if the debouncer task is gone.
    pub fn schedule(&self, action: T) -> bool {
        self.tx.send(action).is_ok()
    }
}

/// The task owning a [`DebounceState`].
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    rx: mpsc::UnboundedReceiver<T>,
    state: DebounceState<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(window: Duration) -> (Self, DebounceHandle<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            window,
            rx,
            state: DebounceState::Idle,
        };
        (debouncer, DebounceHandle { tx })
    }

    /// Drive the coalescer until every handle is dropped.
    ///
    /// `handler` is awaited inline: while it runs, newly scheduled actions
    /// wait in the channel and are coalesced once it returns. A pending
    /// action is still delivered after the last handle goes away.
    pub async fn run<F, Fut>(mut self, mut handler: F)
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        debug!(window_ms = self.window.as_millis() as u64, "debouncer started");

        loop {
            let Some(deadline) = self.state.deadline() else {
                match self.rx.recv().await {
                    Some(action) => {
                        self.state.schedule(action, Instant::now(), self.window);
                        continue;
                    }
                    None => break,
                }
            };

            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(action) => {
                        if self.state.schedule(action, Instant::now(), self.window).is_some() {
                            trace!("pending action replaced; quiet window restarted");
                        }
                    }
                    None => {
                        sleep_until(deadline).await;
                        if let Some(action) = self.state.fire(Instant::now()) {
                            handler(action).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline) => {
                    if let Some(action) = self.state.fire(Instant::now()) {
                        debug!("quiet window elapsed; running pending action");
                        handler(action).await;
                    }
                }
            }
        }

        debug!("debouncer stopped (all handles dropped)");
    }
}
