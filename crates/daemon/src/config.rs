// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller configuration, resolved once at startup from the environment.
//!
//! Grounded in the teacher's `lifecycle::Config::load` (`crates/daemon/src/
//! lifecycle/mod.rs`): one fixed state directory per user, every other path
//! derived from it, loaded once and passed around as a plain value rather
//! than re-read from the environment throughout the process.

use std::path::PathBuf;

use crate::env;
use crate::error::DaemonError;

/// Resolved controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory jobs are persisted under (`<state_dir>/jobs`).
    pub jobs_root: PathBuf,
    /// Port the `/events` and `/health` listener binds to.
    pub controller_port: u16,
    /// `host:port` the runner's job-control routes are reached at.
    pub runner_addr: String,
    /// URL handed to the runner on every `/start` so it knows where to POST
    /// events back to.
    pub callback_url: String,
    /// Controller log file.
    pub log_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level controller.
    ///
    /// Uses fixed paths under `~/.local/state/oj/` (or `$XDG_STATE_HOME/oj/`)
    /// unless overridden by `OJ_STATE_DIR`. One controller serves all jobs
    /// for a user.
    pub fn load() -> Result<Self, DaemonError> {
        let state_dir = env::state_dir()?;
        let controller_port = env::controller_port();

        Ok(Self {
            jobs_root: state_dir.join("jobs"),
            controller_port,
            runner_addr: env::runner_addr(),
            callback_url: format!("http://{}:{}/events", env::callback_host(), controller_port),
            log_path: state_dir.join("daemon.log"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.controller_port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
