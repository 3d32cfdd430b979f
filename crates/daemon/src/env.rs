// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the controller crate.

use std::path::PathBuf;

use crate::error::DaemonError;

/// Resolve state directory: `OJ_STATE_DIR` > `XDG_STATE_HOME/oj` > `~/.local/state/oj`.
pub fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("OJ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("oj"));
    }
    let home = std::env::var("HOME").map_err(|_| DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/oj"))
}

/// Port the controller's `/events` listener binds to.
pub fn controller_port() -> u16 {
    std::env::var("OJ_CONTROLLER_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080)
}

/// `host:port` the controller dials to reach the runner's job-control routes.
pub fn runner_addr() -> String {
    std::env::var("OJ_RUNNER_ADDR").unwrap_or_else(|_| "127.0.0.1:8081".to_string())
}

/// Host the controller advertises to the runner as its own callback address.
/// Only needs to change in a container/k8s deployment where loopback isn't
/// reachable between the two processes.
pub fn callback_host() -> String {
    std::env::var("OJ_CALLBACK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}
