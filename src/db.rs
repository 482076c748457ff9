// src/db.rs

//! Database readiness: validate the connection settings, then poll until the
//! database accepts TCP connections.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::DatabaseSection;
use crate::errors::{DevloopError, Result};

/// Host and port resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseAddress {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for DatabaseAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Check every required variable and resolve the address.
///
/// `lookup` is the environment as tasks will see it.
pub fn resolve_address<F>(section: &DatabaseSection, lookup: F) -> Result<DatabaseAddress>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| lookup(name).filter(|v| !v.is_empty());

    for name in &section.required_env {
        if present(name).is_none() {
            return Err(DevloopError::MissingEnv(name.clone()));
        }
    }

    let host = present(&section.host_env)
        .ok_or_else(|| DevloopError::MissingEnv(section.host_env.clone()))?;
    let raw_port = present(&section.port_env)
        .ok_or_else(|| DevloopError::MissingEnv(section.port_env.clone()))?;
    let port = raw_port.trim().parse::<u16>().map_err(|_| {
        DevloopError::DatabaseAddress(format!("{}={raw_port:?} is not a port", section.port_env))
    })?;

    Ok(DatabaseAddress { host, port })
}

/// Block until the database accepts a connection. There is no retry limit.
pub async fn wait_for_database<F>(section: &DatabaseSection, lookup: F) -> Result<DatabaseAddress>
where
    F: Fn(&str) -> Option<String>,
{
    let addr = resolve_address(section, lookup)?;
    let interval = Duration::from_millis(section.retry_interval_ms);

    info!(%addr, "waiting for database");
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        match tokio::time::timeout(interval, TcpStream::connect((addr.host.as_str(), addr.port))).await {
            Ok(Ok(_)) => {
                info!(%addr, attempts, "database is accepting connections");
                return Ok(addr);
            }
            Ok(Err(err)) => debug!(%addr, attempts, error = %err, "database not ready"),
            Err(_) => debug!(%addr, attempts, "database connection attempt timed out"),
        }
        tokio::time::sleep(interval).await;
    }
}
