// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `oj` — the controller's CLI. Its one subcommand, `run`, is spec.md §6's
//! entry point: validate the environment, recover crashed jobs, bind the
//! event listener, stand up the chat command surface, then block forever.
//! Ported from `main.py`'s `main()`, which does exactly these five steps
//! against the Python orchestrator.
//!
//! No chat transport is actually dialed here — that integration is out of
//! scope (spec.md §1) — so step (d) stands up [`chat::PocChatFrontend`]
//! ready to be driven by one, and step (e) is a literal `pending().await`
//! rather than a Socket Mode connection.

mod chat;
mod commands;
mod env;
mod error;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use oj_daemon::{Config, HttpRunnerClient};
use oj_storage::JobStore;
use tracing::info;

use chat::PocChatFrontend;
use error::CliError;

#[derive(Parser)]
#[command(name = "oj")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate prerequisites, recover state, and serve the controller
    /// until killed.
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let Command::Run = cli.command;

    if let Err(e) = run().await {
        match e {
            CliError::PrerequisitesFailed(errors) => {
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            other => eprintln!("{other}"),
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let prerequisite_errors = env::check_prerequisites();
    if !prerequisite_errors.is_empty() {
        return Err(CliError::PrerequisitesFailed(prerequisite_errors));
    }

    let config = Config::load()?;
    let _log_guard = setup_logging(&config)?;

    let startup = oj_daemon::startup(&config).await?;

    let runner: Arc<dyn oj_engine::RunnerClient> = Arc::new(HttpRunnerClient::new(config.runner_addr.clone()));
    let store = JobStore::new(config.jobs_root.clone());
    let _chat_frontend = PocChatFrontend::new(Arc::clone(&startup.state), store, runner);

    let handler = Arc::new(oj_daemon::make_handler(Arc::clone(&startup.state)));
    tokio::spawn(oj_transport::serve(startup.listener, handler));

    info!("controller ready; no chat transport configured, idling forever");
    std::future::pending::<()>().await;
    Ok(())
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, CliError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = config.log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("oj.log"));
    let dir = config.log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
