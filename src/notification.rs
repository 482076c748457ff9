// src/notification.rs

//! Best-effort desktop notifications.
//!
//! Failing to notify is only ever logged; it never changes control flow.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

/// Sends desktop notifications through whatever the platform offers
/// (`notify-send` on Linux, `osascript` on macOS).
#[derive(Debug, Clone)]
pub struct Notifier {
    backend: Option<Backend>,
}

#[derive(Debug, Clone)]
enum Backend {
    NotifySend(PathBuf),
    Osascript(PathBuf),
}

impl Notifier {
    /// Look up a notification helper on `PATH`. When `enabled` is false, or
    /// nothing is found, the notifier only logs.
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let backend = if cfg!(target_os = "macos") {
            which::which("osascript").ok().map(Backend::Osascript)
        } else {
            which::which("notify-send").ok().map(Backend::NotifySend)
        };

        if backend.is_none() {
            debug!("no desktop notification helper found; notifications disabled");
        }
        Self { backend }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Notify about an error condition.
    pub fn error(&self, title: &str, body: &str) {
        let Some(backend) = &self.backend else {
            return;
        };

        let mut cmd = match backend {
            Backend::NotifySend(bin) => {
                let mut c = Command::new(bin);
                c.arg("--urgency=critical")
                    .arg("--app-name=devloop")
                    .arg(title)
                    .arg(body);
                c
            }
            Backend::Osascript(bin) => {
                let mut c = Command::new(bin);
                c.arg("-e").arg(format!(
                    "display notification {} with title {}",
                    applescript_quote(body),
                    applescript_quote(title)
                ));
                c
            }
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if let Err(err) = cmd.spawn() {
            warn!(error = %err, "failed to send desktop notification");
        }
    }
}

fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_strings_are_escaped() {
        assert_eq!(applescript_quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(applescript_quote(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn disabled_notifier_is_silent() {
        Notifier::disabled().error("title", "body");
        assert!(Notifier::new(false).backend.is_none());
    }
}
