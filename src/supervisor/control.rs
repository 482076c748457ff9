// src/supervisor/control.rs

//! Platform process control: "terminate process tree" and "free a listening
//! port".
//!
//! The supervisor only sees the [`ProcessControl`] trait. The system
//! implementation shells out to the platform tools:
//!
//! - POSIX: `kill -KILL -- -<pgid>` for the group, `lsof` for the port owner.
//! - Windows: `taskkill /F /T /PID` for the tree, `netstat -ano` for the port
//!   owner.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{Context, anyhow};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::Result;
#[cfg(unix)]
use crate::exec::task::shell_command;

/// What freeing a port had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRelease {
    /// Nothing was listening.
    AlreadyFree,
    /// These processes held the port and were killed.
    Killed(Vec<u32>),
}

pub type ControlFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Capability to forcefully end process trees and port owners.
pub trait ProcessControl: Send + Sync {
    /// Kill the process group (POSIX) or process tree (Windows) led by `pid`.
    fn terminate_tree(&self, pid: u32) -> ControlFuture<'_, ()>;

    /// Kill whatever listens on TCP `port`. Nothing listening is success.
    fn free_port(&self, port: u16) -> ControlFuture<'_, PortRelease>;
}

/// [`ProcessControl`] backed by the platform's command-line tools.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessControl;

impl ProcessControl for SystemProcessControl {
    fn terminate_tree(&self, pid: u32) -> ControlFuture<'_, ()> {
        Box::pin(platform::terminate_tree(pid))
    }

    fn free_port(&self, port: u16) -> ControlFuture<'_, PortRelease> {
        Box::pin(async move {
            let pids = platform::port_owners(port).await?;
            if pids.is_empty() {
                debug!(port, "port already free");
                return Ok(PortRelease::AlreadyFree);
            }
            kill_port_owners(port, pids, platform::kill_pid).await
        })
    }
}

/// Kill every owner, even when some kills fail (an owner may exit between
/// the lookup and the kill). Fails only when no kill succeeded.
async fn kill_port_owners<F, Fut>(port: u16, pids: Vec<u32>, kill: F) -> Result<PortRelease>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut killed = Vec::with_capacity(pids.len());
    let mut failures = Vec::new();
    for pid in pids {
        info!(port, pid, "killing leftover process holding the server port");
        match kill(pid).await {
            Ok(()) => killed.push(pid),
            Err(err) => {
                warn!(port, pid, error = %err, "could not kill port owner");
                failures.push(format!("{pid}: {err}"));
            }
        }
    }

    if killed.is_empty() && !failures.is_empty() {
        return Err(anyhow!("could not kill any owner of port {port} ({})", failures.join("; ")).into());
    }
    Ok(PortRelease::Killed(killed))
}

/// Run a tool and return its stdout, or the exit status when it failed.
async fn capture(cmd: &mut Command) -> Result<(bool, String)> {
    let output = cmd
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .with_context(|| format!("running {:?}", cmd.as_std().get_program()))?;
    Ok((
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    ))
}

#[cfg(unix)]
mod platform {
    use super::*;

    // `kill` goes through the shell so minimal systems without a kill
    // binary still work.
    pub(super) async fn terminate_tree(pgid: u32) -> Result<()> {
        let (ok, _) = capture(&mut shell_command(&format!("kill -KILL -- -{pgid}"))).await?;
        if ok {
            Ok(())
        } else {
            Err(anyhow!("kill -KILL -{pgid} failed (group already gone?)").into())
        }
    }

    pub(super) async fn kill_pid(pid: u32) -> Result<()> {
        let (ok, _) = capture(&mut shell_command(&format!("kill -KILL {pid}"))).await?;
        if ok {
            Ok(())
        } else {
            Err(anyhow!("kill -KILL {pid} failed").into())
        }
    }

    pub(super) async fn port_owners(port: u16) -> Result<Vec<u32>> {
        let lsof = which::which("lsof").context("lsof is required to free the server port")?;
        // lsof exits 1 when nothing matches; stdout is empty then.
        let (_, out) = capture(
            Command::new(lsof)
                .arg("-t")
                .arg(format!("-iTCP:{port}"))
                .arg("-sTCP:LISTEN"),
        )
        .await?;
        Ok(parse_lsof_pids(&out))
    }
}

#[cfg(windows)]
mod platform {
    use super::*;

    pub(super) async fn terminate_tree(pid: u32) -> Result<()> {
        kill_pid(pid).await
    }

    pub(super) async fn kill_pid(pid: u32) -> Result<()> {
        let (ok, _) = capture(
            Command::new("taskkill")
                .arg("/F")
                .arg("/T")
                .arg("/PID")
                .arg(pid.to_string()),
        )
        .await?;
        if ok {
            Ok(())
        } else {
            Err(anyhow!("taskkill /PID {pid} failed").into())
        }
    }

    pub(super) async fn port_owners(port: u16) -> Result<Vec<u32>> {
        let (_, out) = capture(Command::new("netstat").arg("-ano").arg("-p").arg("TCP")).await?;
        Ok(parse_netstat_pids(&out, port))
    }
}

/// Parse `lsof -t` output: one pid per line.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn parse_lsof_pids(out: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = out
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

static NETSTAT_LISTEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*TCP\s+(\S+):(\d+)\s+\S+\s+LISTENING\s+(\d+)\s*$").ok()
});

/// Parse `netstat -ano` output for pids listening on `port`.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn parse_netstat_pids(out: &str, port: u16) -> Vec<u32> {
    let Some(listen) = NETSTAT_LISTEN.as_ref() else {
        return Vec::new();
    };
    let mut pids: Vec<u32> = out
        .lines()
        .filter_map(|line| {
            let caps = listen.captures(line)?;
            let local_port: u16 = caps[2].parse().ok()?;
            if local_port != port {
                return None;
            }
            caps[3].parse().ok()
        })
        .filter(|pid| *pid != 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}
