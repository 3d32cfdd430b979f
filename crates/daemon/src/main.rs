// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Odd Jobs Controller daemon (ojd)
//!
//! Owns the job-state store, the single-concurrency job queue, and the
//! approval broker; listens for `POST /events` from the runner. Has no chat
//! integration of its own — `oj run` (the `oj` binary) links this crate as a
//! library and layers a `ChatFrontend` on top of the same queue and broker.
//! Running `ojd` directly is useful standalone: for smoke-testing the
//! controller-runner link without a chat service, or as the embeddable
//! building block a different front-end would link against.

use std::sync::Arc;

use oj_daemon::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let log_guard = setup_logging(&config)?;

    let result = oj_daemon::startup(&config).await?;
    let handler = Arc::new(oj_daemon::make_handler(result.state));

    info!("controller ready");
    oj_transport::serve(result.listener, handler).await;

    drop(log_guard);
    Ok(())
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = config.log_path.file_name().ok_or("daemon log path has no file name")?;
    let dir = config.log_path.parent().ok_or("daemon log path has no parent directory")?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
