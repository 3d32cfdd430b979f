// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The chat command surface: spec.md §6's "contract the core must support"
//! for whatever chat front-end is wired in. The front-end itself (parsing
//! Slack/Discord events off the wire, posting messages) is out of scope
//! (spec.md §1); this trait is the seam a real integration would call into,
//! grounded in `slack_bot.py`'s `handle_poc_command`/button/thread-reply
//! handlers, now implemented against the real queue/broker/store instead of
//! a live Slack client.
//!
//! [`NullChatFrontend`] is the default for `oj run`: the teacher's own
//! `NullCallback`/`NullLifecycleCallback` no-op pattern, used because no
//! real chat transport is wired into this build. [`RecordingChatFrontend`]
//! is the test double, mirroring `RecordingLifecycleCallback`.

use std::sync::Arc;

use async_trait::async_trait;
use oj_core::JobId;
use oj_daemon::ControllerState;
use oj_engine::RunnerClient;
use oj_storage::JobStore;
use parking_lot::Mutex;

use crate::commands::{format_job_list_entry, format_job_status};
use crate::error::ChatError;

/// Which button on an approval prompt fired, ported from `slack_bot.py`'s
/// three distinct `@app.action(...)` handlers (`approve_tool`,
/// `approve_tool_all`, `deny_tool`) collapsed into one parameter here since
/// they all parse the same `"job_id|tool_use_id|tool_name"` button value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonDecision {
    Approve,
    ApproveAll,
    Deny,
}

#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub goal: String,
    pub model: Option<String>,
    pub requested_by: String,
    pub channel_id: String,
    pub thread_ts: String,
}

/// The chat command surface. Every method returns the text a real front-end
/// would post back into the thread, or an error it would render as a chat
/// message of its own.
#[async_trait]
pub trait ChatFrontend: Send + Sync {
    async fn create_and_enqueue_job(&self, request: CreateJobRequest) -> Result<String, ChatError>;
    async fn render_status(&self, job_id: Option<&str>) -> Result<String, ChatError>;
    async fn cancel(&self, job_id: Option<&str>) -> Result<String, ChatError>;
    async fn list_recent(&self, limit: usize) -> Result<String, ChatError>;
    async fn handle_button_action(&self, value: &str, decision: ButtonDecision, message_ts: &str) -> Result<(), ChatError>;
    async fn handle_thread_reply(&self, job_id: &str, text: &str) -> Result<(), ChatError>;
}

/// The real implementation, wired to the controller's live queue/broker
/// (shared via `Arc<ControllerState>` — the broker's pending-approval table
/// is in-memory and not cheaply cloneable, so this must be the same
/// instance the `/events` handler mutates, not a second one) plus its own
/// store handle and runner client for reads and message forwarding.
pub struct PocChatFrontend {
    state: Arc<ControllerState>,
    store: JobStore,
    runner: Arc<dyn RunnerClient>,
}

impl PocChatFrontend {
    pub fn new(state: Arc<ControllerState>, store: JobStore, runner: Arc<dyn RunnerClient>) -> Self {
        Self { state, store, runner }
    }

    fn resolve_job_id(&self, job_id: Option<&str>) -> Option<JobId> {
        match job_id {
            Some(id) => Some(JobId::from_string(id)),
            None => self.state.queue.current_job_id(),
        }
    }

    fn parse_button_value(value: &str) -> Result<(JobId, String, String), ChatError> {
        let mut parts = value.splitn(3, '|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(job_id), Some(tool_use_id), Some(tool_name)) => {
                Ok((JobId::from_string(job_id), tool_use_id.to_string(), tool_name.to_string()))
            }
            _ => Err(ChatError::InvalidButtonValue(value.to_string())),
        }
    }
}

#[async_trait]
impl ChatFrontend for PocChatFrontend {
    async fn create_and_enqueue_job(&self, request: CreateJobRequest) -> Result<String, ChatError> {
        let mut job = self.store.create(request.goal.clone())?;
        job.requested_by = request.requested_by;
        job.channel_id = request.channel_id;
        job.thread_ts = request.thread_ts.clone();
        job.original_message_ts = request.thread_ts;
        if let Some(model) = request.model {
            job.model = model;
        }
        self.store.save(&job)?;

        self.state.queue.enqueue(job.job_id.clone());

        Ok(format!(":rocket: Job `{}` started: _{}_\nModel: `{}`", job.job_id, job.goal, job.model))
    }

    async fn render_status(&self, job_id: Option<&str>) -> Result<String, ChatError> {
        let Some(id) = self.resolve_job_id(job_id) else {
            return Err(ChatError::NoActiveJob);
        };
        let job = self.store.load(&id).map_err(|_| ChatError::JobNotFound(id.to_string()))?;
        Ok(format_job_status(&job))
    }

    async fn cancel(&self, job_id: Option<&str>) -> Result<String, ChatError> {
        let Some(id) = self.resolve_job_id(job_id) else {
            return Err(ChatError::NoActiveJob);
        };
        if self.state.queue.cancel(&id).await? {
            Ok(format!(":stop_sign: Cancellation requested for `{id}`."))
        } else {
            Ok(format!(":x: Job `{id}` not found or already finished."))
        }
    }

    async fn list_recent(&self, limit: usize) -> Result<String, ChatError> {
        let ids = self.store.list()?;
        if ids.is_empty() {
            return Ok("No jobs found.".to_string());
        }

        let mut lines = vec!["*Recent jobs:*".to_string()];
        for id in ids.iter().rev().take(limit) {
            match self.store.load(id) {
                Ok(job) => lines.push(format_job_list_entry(&job)),
                Err(_) => lines.push(format!("  `{id}` — (error reading state)")),
            }
        }
        Ok(lines.join("\n"))
    }

    async fn handle_button_action(&self, value: &str, decision: ButtonDecision, message_ts: &str) -> Result<(), ChatError> {
        let (job_id, tool_use_id, _tool_name) = Self::parse_button_value(value)?;
        match decision {
            ButtonDecision::Approve => {
                self.state.broker.handle_approve(&job_id, &tool_use_id, false, message_ts).await?;
            }
            ButtonDecision::ApproveAll => {
                self.state.broker.handle_approve(&job_id, &tool_use_id, true, message_ts).await?;
            }
            ButtonDecision::Deny => {
                self.state.broker.handle_deny(&job_id, &tool_use_id, message_ts).await?;
            }
        }
        Ok(())
    }

    async fn handle_thread_reply(&self, job_id: &str, text: &str) -> Result<(), ChatError> {
        let id = JobId::from_string(job_id);
        if self.state.broker.handle_text_reply(&id, text).await? {
            return Ok(());
        }
        self.runner.send_message(&id, text).await?;
        Ok(())
    }
}

/// No-op stand-in used when no real chat transport is wired in.
#[derive(Debug, Default)]
pub struct NullChatFrontend;

#[async_trait]
impl ChatFrontend for NullChatFrontend {
    async fn create_and_enqueue_job(&self, _request: CreateJobRequest) -> Result<String, ChatError> {
        Ok(String::new())
    }

    async fn render_status(&self, _job_id: Option<&str>) -> Result<String, ChatError> {
        Ok(String::new())
    }

    async fn cancel(&self, _job_id: Option<&str>) -> Result<String, ChatError> {
        Ok(String::new())
    }

    async fn list_recent(&self, _limit: usize) -> Result<String, ChatError> {
        Ok(String::new())
    }

    async fn handle_button_action(&self, _value: &str, _decision: ButtonDecision, _message_ts: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn handle_thread_reply(&self, _job_id: &str, _text: &str) -> Result<(), ChatError> {
        Ok(())
    }
}

/// One recorded call, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    CreateJob(String),
    Status(Option<String>),
    Cancel(Option<String>),
    List(usize),
    Button(String, String),
    ThreadReply(String, String),
}

/// Records every call instead of acting on it.
#[derive(Default)]
pub struct RecordingChatFrontend {
    calls: Mutex<Vec<ChatCall>>,
}

impl RecordingChatFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChatFrontend for RecordingChatFrontend {
    async fn create_and_enqueue_job(&self, request: CreateJobRequest) -> Result<String, ChatError> {
        self.calls.lock().push(ChatCall::CreateJob(request.goal));
        Ok(String::new())
    }

    async fn render_status(&self, job_id: Option<&str>) -> Result<String, ChatError> {
        self.calls.lock().push(ChatCall::Status(job_id.map(str::to_string)));
        Ok(String::new())
    }

    async fn cancel(&self, job_id: Option<&str>) -> Result<String, ChatError> {
        self.calls.lock().push(ChatCall::Cancel(job_id.map(str::to_string)));
        Ok(String::new())
    }

    async fn list_recent(&self, limit: usize) -> Result<String, ChatError> {
        self.calls.lock().push(ChatCall::List(limit));
        Ok(String::new())
    }

    async fn handle_button_action(&self, value: &str, decision: ButtonDecision, _message_ts: &str) -> Result<(), ChatError> {
        self.calls.lock().push(ChatCall::Button(value.to_string(), format!("{decision:?}")));
        Ok(())
    }

    async fn handle_thread_reply(&self, job_id: &str, text: &str) -> Result<(), ChatError> {
        self.calls.lock().push(ChatCall::ThreadReply(job_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
