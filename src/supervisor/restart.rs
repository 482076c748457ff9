// src/supervisor/restart.rs

//! Restart requests and the loop that serves them.
//!
//! A request carries no payload: only whether one is pending matters. The
//! channel has depth 1, so any number of requests made while a restart is
//! executing collapse into exactly one more restart.
//!
//! [`run_restart_loop`] is the only place that stops and starts the server
//! after boot. It awaits each stop before the matching start, so two
//! instances never overlap.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::types::BootMode;

/// Unit signal asking the supervisor to stop and start the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest;

/// What happened to a restart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The slot was empty; a restart is now pending.
    Queued,
    /// A restart was already pending; this one was merged into it.
    Coalesced,
    /// The restart loop is gone.
    Closed,
}

/// Producer side, held by the dispatcher.
#[derive(Debug, Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<RestartRequest>,
}

impl RestartHandle {
    pub fn request(&self) -> RequestOutcome {
        match self.tx.try_send(RestartRequest) {
            Ok(()) => {
                debug!("restart requested");
                RequestOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                debug!("restart already pending; request coalesced");
                RequestOutcome::Coalesced
            }
            Err(TrySendError::Closed(_)) => RequestOutcome::Closed,
        }
    }
}

/// Consumer side, owned by the restart loop.
pub type RestartReceiver = mpsc::Receiver<RestartRequest>;

pub fn restart_channel() -> (RestartHandle, RestartReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (RestartHandle { tx }, rx)
}

pub type LifecycleFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Something that can be stopped and started, i.e. the supervised server.
pub trait ServerLifecycle: Send {
    fn start(&mut self, mode: BootMode) -> LifecycleFuture<'_>;
    fn stop(&mut self) -> LifecycleFuture<'_>;
}

/// Fires the shutdown of the restart loop (Ctrl-C).
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: oneshot::Sender<()>,
}

impl ShutdownTrigger {
    pub fn fire(self) {
        let _ = self.tx.send(());
    }
}

/// Receiving half of [`ShutdownTrigger`].
///
/// Dropping the trigger without firing it detaches the signal: it then never
/// resolves.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: oneshot::Receiver<()>,
    state: SignalState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalState {
    Pending,
    Fired,
    Detached,
}

impl ShutdownSignal {
    /// Resolve once the trigger fires. Cancel-safe, and returns immediately
    /// on every call after the first firing.
    pub async fn wait(&mut self) {
        if self.state == SignalState::Pending {
            self.state = match (&mut self.rx).await {
                Ok(()) => SignalState::Fired,
                Err(_) => SignalState::Detached,
            };
        }
        if self.state == SignalState::Detached {
            std::future::pending::<()>().await;
        }
    }

    /// Non-blocking check.
    pub fn is_fired(&mut self) -> bool {
        if self.state == SignalState::Pending {
            self.state = match self.rx.try_recv() {
                Ok(()) => SignalState::Fired,
                Err(oneshot::error::TryRecvError::Empty) => SignalState::Pending,
                Err(oneshot::error::TryRecvError::Closed) => SignalState::Detached,
            };
        }
        self.state == SignalState::Fired
    }
}

pub fn shutdown_signal() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = oneshot::channel();
    (
        ShutdownTrigger { tx },
        ShutdownSignal {
            rx,
            state: SignalState::Pending,
        },
    )
}

/// Serve restart requests until shutdown, then stop the server.
///
/// Returns how many restarts were performed. A failed restart leaves the
/// server down until the next request. Dropping the trigger without firing
/// does not shut the loop down; closing the request channel does.
pub async fn run_restart_loop<S: ServerLifecycle + ?Sized>(
    server: &mut S,
    mut requests: RestartReceiver,
    shutdown: &mut ShutdownSignal,
) -> Result<u64> {
    let mut restarts = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                info!("shutdown requested; stopping server");
                break;
            }

            req = requests.recv() => {
                let Some(RestartRequest) = req else {
                    debug!("restart channel closed; stopping server");
                    break;
                };

                info!("restarting server");
                if let Err(err) = server.stop().await {
                    warn!(error = %err, "stopping the server failed; starting anyway");
                }
                restarts += 1;
                if let Err(err) = server.start(BootMode::Restart).await {
                    error!(error = %err, "server failed to restart; waiting for the next change");
                }
            }
        }
    }

    server.stop().await?;
    Ok(restarts)
}
