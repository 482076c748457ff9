// src/signals.rs

//! External quit signals.
//!
//! Ctrl-C everywhere, plus SIGTERM and SIGHUP on unix. The server lives in
//! its own process group, so it never sees these itself; devloop has to
//! catch them and stop it.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::Result;
use crate::supervisor::ShutdownTrigger;

/// Registered quit-signal handlers.
#[derive(Debug)]
pub struct QuitSignals {
    #[cfg(unix)]
    term: Signal,
    #[cfg(unix)]
    hup: Signal,
}

impl QuitSignals {
    /// Register the handlers now, so a signal arriving before the first
    /// [`QuitSignals::recv`] is not lost.
    pub fn install() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            term: signal(SignalKind::terminate())?,
            #[cfg(unix)]
            hup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next quit signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c() => "SIGINT",
                _ = self.term.recv() => "SIGTERM",
                _ = self.hup.recv() => "SIGHUP",
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c().await;
            "Ctrl-C"
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the listener cannot be installed.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Fire `trigger` on the first quit signal.
pub fn forward_quit_signals(trigger: ShutdownTrigger) -> Result<JoinHandle<()>> {
    let mut signals = QuitSignals::install()?;
    Ok(tokio::spawn(async move {
        let name = signals.recv().await;
        info!(signal = name, "quit signal received");
        trigger.fire();
    }))
}
