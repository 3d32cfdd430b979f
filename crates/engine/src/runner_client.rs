// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller's view of the runner: the five job-control calls from
//! spec.md §4.6's first table (`/start`, `/approve`, `/message`, `/cancel`,
//! `/end`), abstracted behind a trait so the queue and broker are testable
//! without an HTTP runner.
//!
//! Grounded in `docker_exec.py`'s `start_agent_job`/`send_approval`/
//! `send_message`/`cancel_agent_job`/`end_agent_job` — each `_post` call
//! there becomes one trait method here — and shaped like the teacher's
//! `AgentAdapter` trait (`crates/daemon/src/adapters/agent/mod.rs`): a real
//! implementation lives in `oj-daemon` over `oj-transport`, and a
//! [`FakeRunnerClient`] test double ships alongside, mirroring the teacher's
//! `FakeAgentAdapter` (`crates/daemon/src/adapters/agent/fake.rs`).

use async_trait::async_trait;
use oj_core::JobId;
use parking_lot::Mutex;
use oj_wire::{ApproveRequest, ApproveResponse, MessageResponse, StartRequest, StartResponse};

/// Transport- or protocol-level failure talking to the runner. `docker_exec.py`'s
/// `_post`/`_get` helpers catch every exception and return `{"error": "Runner
/// unreachable", "status": "failed"}` rather than raising — this enum keeps
/// that distinction (unreachable vs. a well-formed error body) typed instead
/// of collapsing both into one string, since the queue's start-worker and the
/// broker branch on it differently (spec.md §7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunnerClientError {
    #[error("runner unreachable: {0}")]
    Unreachable(String),
    #[error("runner rejected request: {0}")]
    Rejected(String),
}

/// The controller→runner RPC surface (spec.md §4.6's first table), minus
/// `/status` and `/health` which are read paths the queue/broker never call.
#[async_trait]
pub trait RunnerClient: Send + Sync + 'static {
    async fn start(&self, job_id: &JobId, request: StartRequest) -> Result<StartResponse, RunnerClientError>;
    async fn approve(&self, job_id: &JobId, request: ApproveRequest) -> Result<ApproveResponse, RunnerClientError>;
    async fn send_message(&self, job_id: &JobId, message: &str) -> Result<MessageResponse, RunnerClientError>;
    async fn cancel(&self, job_id: &JobId) -> Result<(), RunnerClientError>;
    async fn end(&self, job_id: &JobId) -> Result<(), RunnerClientError>;
}

/// A single recorded call, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerCall {
    Start { job_id: String, goal: String },
    Approve { job_id: String, tool_use_id: String, approved: bool, auto_approve_tool: bool },
    SendMessage { job_id: String, message: String },
    Cancel { job_id: String },
    End { job_id: String },
}

/// Scriptable [`RunnerClient`] test double. Defaults every call to success;
/// set `fail_start`/`fail_approve` etc. to make a call return
/// [`RunnerClientError::Unreachable`], exercising the queue's/broker's error
/// paths without a real runner (mirrors `FakeAgentAdapter`'s
/// `fail_spawn`-style knobs).
#[derive(Default)]
pub struct FakeRunnerClient {
    calls: Mutex<Vec<RunnerCall>>,
    pub fail_start: Mutex<bool>,
    pub fail_approve: Mutex<bool>,
    pub fail_cancel: Mutex<bool>,
    pub fail_end: Mutex<bool>,
}

impl FakeRunnerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().clone()
    }

    pub fn set_fail_start(&self, fail: bool) {
        *self.fail_start.lock() = fail;
    }
}

#[async_trait]
impl RunnerClient for FakeRunnerClient {
    async fn start(&self, job_id: &JobId, request: StartRequest) -> Result<StartResponse, RunnerClientError> {
        self.calls.lock().push(RunnerCall::Start { job_id: job_id.to_string(), goal: request.goal.clone() });
        if *self.fail_start.lock() {
            return Err(RunnerClientError::Unreachable("runner unreachable".into()));
        }
        Ok(StartResponse {
            job_id: job_id.to_string(),
            status: "started".into(),
            model: request.model.unwrap_or_else(|| oj_storage::DEFAULT_MODEL.to_string()),
        })
    }

    async fn approve(&self, job_id: &JobId, request: ApproveRequest) -> Result<ApproveResponse, RunnerClientError> {
        self.calls.lock().push(RunnerCall::Approve {
            job_id: job_id.to_string(),
            tool_use_id: request.tool_use_id.clone(),
            approved: request.approved,
            auto_approve_tool: request.auto_approve_tool,
        });
        if *self.fail_approve.lock() {
            return Err(RunnerClientError::Unreachable("runner unreachable".into()));
        }
        Ok(ApproveResponse { status: "ok".into(), approved: request.approved })
    }

    async fn send_message(&self, job_id: &JobId, message: &str) -> Result<MessageResponse, RunnerClientError> {
        self.calls.lock().push(RunnerCall::SendMessage { job_id: job_id.to_string(), message: message.to_string() });
        Ok(MessageResponse { status: "message_added".into() })
    }

    async fn cancel(&self, job_id: &JobId) -> Result<(), RunnerClientError> {
        self.calls.lock().push(RunnerCall::Cancel { job_id: job_id.to_string() });
        if *self.fail_cancel.lock() {
            return Err(RunnerClientError::Unreachable("runner unreachable".into()));
        }
        Ok(())
    }

    async fn end(&self, job_id: &JobId) -> Result<(), RunnerClientError> {
        self.calls.lock().push(RunnerCall::End { job_id: job_id.to_string() });
        if *self.fail_end.lock() {
            return Err(RunnerClientError::Unreachable("runner unreachable".into()));
        }
        Ok(())
    }
}
