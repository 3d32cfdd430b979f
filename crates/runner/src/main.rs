// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Odd Jobs Runner (oj-runner)
//!
//! Hosts LLM agent sessions, one per job, reachable over the job-control
//! HTTP routes in `routes.rs`. Started by the controller's container/process
//! runtime, never invoked directly by a human.

mod env;

use std::sync::Arc;

use oj_runner::{EventSink, FakeLlmClient, HttpEventSink, LlmClient, LlmClientError, LlmClientFactory, LlmTurnInput, LlmTurnStream, RunnerState};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_guard = setup_logging()?;

    let port = env::port();
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "runner listening");

    let event_sink: Arc<dyn EventSink> = Arc::new(HttpEventSink::new(env::events_dir()));
    let state = RunnerState::new(llm_factory(), event_sink);
    let handler = Arc::new(oj_runner::make_handler(state));

    oj_transport::serve(listener, handler).await;

    drop(log_guard);
    Ok(())
}

/// Builds the LLM driver used for every new session.
///
/// No real provider SDK is wired in: the controller-runner protocol in this
/// repository treats the LLM as an external collaborator (spec.md §1), the
/// same way `ChatFrontend` stands in for the chat integration on the
/// controller side. [`UnconfiguredLlmClient`] fails fast with a clear error
/// until a concrete provider is plugged in here; credentials are already
/// threaded through `env::llm_api_key`/`env::llm_base_url` for that wiring.
fn llm_factory() -> LlmClientFactory {
    if env::llm_api_key().is_none() {
        warn!("OJ_LLM_API_KEY not set; sessions will fail on their first turn");
    }
    Arc::new(|| -> Box<dyn LlmClient> {
        if std::env::var("OJ_RUNNER_FAKE_LLM").is_ok() {
            return Box::new(FakeLlmClient::new());
        }
        Box::new(UnconfiguredLlmClient)
    })
}

/// Placeholder [`LlmClient`] until a real provider integration is wired into
/// [`llm_factory`]. Always rejects, so a misconfigured deployment fails a
/// job immediately and visibly rather than hanging.
struct UnconfiguredLlmClient;

#[async_trait::async_trait]
impl LlmClient for UnconfiguredLlmClient {
    async fn run_turn(&mut self, _input: LlmTurnInput) -> Result<LlmTurnStream, LlmClientError> {
        Err(LlmClientError::Unreachable("no LLM provider configured (set OJ_LLM_API_KEY)".into()))
    }
}

fn setup_logging() -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = env::log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = log_path.file_name().ok_or("runner log path has no file name")?;
    let dir = log_path.parent().ok_or("runner log path has no parent directory")?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
