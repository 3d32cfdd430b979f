// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller startup: create the jobs directory, recover crashed jobs, wire
//! the queue/broker to the runner client, then bind the `/events` listener
//! last.
//!
//! Ordering grounded in the teacher's `lifecycle::startup` (`crates/daemon/
//! src/lifecycle/startup.rs`): directories and recovery happen before the
//! socket is bound, so a startup failure never leaves a half-bound listener
//! for a client to connect to.

use std::sync::Arc;

use oj_engine::{recover_crashed_jobs, ApprovalBroker, JobQueue};
use oj_storage::JobStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::DaemonError;
use crate::events::ControllerState;
use crate::runner_client::HttpRunnerClient;

/// Everything [`crate::startup`] hands back to the binary: the bound
/// listener plus the state it should be served with.
pub struct StartupResult {
    pub state: Arc<ControllerState>,
    pub listener: TcpListener,
}

pub async fn startup(config: &Config) -> Result<StartupResult, DaemonError> {
    std::fs::create_dir_all(&config.jobs_root)?;

    let store = JobStore::new(config.jobs_root.clone());

    let recovered = recover_crashed_jobs(&store)?;
    if !recovered.is_empty() {
        warn!(count = recovered.len(), "recovered stale jobs from a previous run");
    }

    let runner: Arc<dyn oj_engine::RunnerClient> = Arc::new(HttpRunnerClient::new(config.runner_addr.clone()));
    let queue = JobQueue::new(store.clone(), Arc::clone(&runner), config.callback_url.clone());
    let broker = ApprovalBroker::new(store, runner);
    let state = ControllerState::new(queue, broker);

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await.map_err(|e| DaemonError::BindFailed(bind_addr, e))?;
    info!(addr = %config.bind_addr(), "controller listening");

    Ok(StartupResult { state, listener })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
