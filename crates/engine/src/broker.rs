// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single pending-approval-per-job table.
//!
//! Grounded in `approvals.py`'s `ApprovalManager`: one pending entry per job
//! id, `handle_approve`/`handle_deny` pop-and-match on `tool_use_id`, and
//! `handle_text_reply` normalizes a thread reply against the same
//! yes/no vocabulary before delegating to one of the two. `_update_slack_message`
//! becomes the [`BrokerSink`] trait here — the UI side effect is out of this
//! crate's scope (spec.md §1), so callers wire in their own sink the way the
//! teacher wires `NullCallback`/`DesktopNotifyAdapter` behind a trait.

use std::collections::HashMap;
use std::sync::Arc;

use oj_core::{Clock, JobId, SystemClock};
use oj_storage::JobStore;
use oj_wire::ApproveRequest;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::BrokerError;
use crate::runner_client::RunnerClient;

/// One tool call awaiting a yes/no decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub tool_use_id: String,
    pub tool_name: String,
    pub channel_id: String,
    pub thread_ts: String,
}

/// Side effect fired whenever a pending approval is resolved — normally a UI
/// update (editing the approval message into its decided state). Out of this
/// crate's scope; implement against whatever front-end is wired in.
pub trait BrokerSink: Send + Sync + 'static {
    /// `message_ts` is the UI prompt's own timestamp/id when the decision
    /// arrived from a button click on that prompt — edit it in place.
    /// Empty when the decision came from a text reply: post a new message
    /// instead (mirrors `_update_slack_message`'s `message_ts` fallback).
    fn on_decision(&self, job_id: &JobId, pending: &PendingApproval, approved: bool, auto_all: bool, message_ts: &str);
}

/// Default sink: does nothing.
#[derive(Debug, Default)]
pub struct NullBrokerSink;

impl BrokerSink for NullBrokerSink {
    fn on_decision(&self, _job_id: &JobId, _pending: &PendingApproval, _approved: bool, _auto_all: bool, _message_ts: &str) {}
}

/// One recorded decision, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerDecision {
    pub job_id: String,
    pub tool_name: String,
    pub approved: bool,
    pub auto_all: bool,
    pub message_ts: String,
}

/// Records every decision instead of acting on it.
#[derive(Default)]
pub struct RecordingBrokerSink {
    decisions: Mutex<Vec<BrokerDecision>>,
}

impl RecordingBrokerSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<BrokerDecision> {
        self.decisions.lock().clone()
    }
}

impl BrokerSink for RecordingBrokerSink {
    fn on_decision(&self, job_id: &JobId, pending: &PendingApproval, approved: bool, auto_all: bool, message_ts: &str) {
        self.decisions.lock().push(BrokerDecision {
            job_id: job_id.to_string(),
            tool_name: pending.tool_name.clone(),
            approved,
            auto_all,
            message_ts: message_ts.to_string(),
        });
    }
}

/// Tracks the one pending approval per job and forwards decisions to the
/// runner.
pub struct ApprovalBroker<C: Clock = SystemClock> {
    store: JobStore<C>,
    runner: Arc<dyn RunnerClient>,
    sink: Arc<dyn BrokerSink>,
    pending: Mutex<HashMap<JobId, PendingApproval>>,
}

impl<C: Clock> ApprovalBroker<C> {
    pub fn new(store: JobStore<C>, runner: Arc<dyn RunnerClient>) -> Self {
        Self::with_sink(store, runner, Arc::new(NullBrokerSink))
    }

    pub fn with_sink(store: JobStore<C>, runner: Arc<dyn RunnerClient>, sink: Arc<dyn BrokerSink>) -> Self {
        Self { store, runner, sink, pending: Mutex::new(HashMap::new()) }
    }

    /// Record a pending approval raised by the runner's `approval_needed` event.
    pub fn register_pending(&self, job_id: JobId, tool_use_id: String, tool_name: String, channel_id: String, thread_ts: String) {
        self.pending.lock().insert(job_id, PendingApproval { tool_use_id, tool_name, channel_id, thread_ts });
    }

    /// The pending approval for a job, if any.
    pub fn pending(&self, job_id: &JobId) -> Option<PendingApproval> {
        self.pending.lock().get(job_id).cloned()
    }

    /// Remove any pending approval for a job without resolving it — used
    /// when an `approval_timeout` or terminal event arrives from the runner.
    pub fn clear(&self, job_id: &JobId) {
        self.pending.lock().remove(job_id);
    }

    /// Approve a pending tool call. Returns whether a matching pending
    /// approval was found. `message_ts`, when non-empty, is the approval
    /// prompt's own timestamp (from a button click) so the sink can edit it
    /// in place rather than post a follow-up.
    pub async fn handle_approve(
        &self,
        job_id: &JobId,
        tool_use_id: &str,
        auto_all: bool,
        message_ts: &str,
    ) -> Result<bool, BrokerError>
    where
        C: Clock,
    {
        let Some(pending) = self.take_matching(job_id, tool_use_id) else {
            return Ok(false);
        };

        if auto_all {
            // Recorded before the runner is told, so a crash between the two
            // still leaves the tool pre-approved on restart.
            let mut job = self.store.load(job_id)?;
            job.approved_tools.insert(pending.tool_name.clone());
            self.store.save(&job)?;
        }

        let request = ApproveRequest { tool_use_id: tool_use_id.to_string(), approved: true, auto_approve_tool: auto_all };
        if let Err(e) = self.runner.approve(job_id, request).await {
            warn!(%job_id, error = %e, "approve RPC to runner failed");
        }

        self.sink.on_decision(job_id, &pending, true, auto_all, message_ts);
        Ok(true)
    }

    /// Deny a pending tool call. Returns whether a matching pending approval
    /// was found.
    pub async fn handle_deny(&self, job_id: &JobId, tool_use_id: &str, message_ts: &str) -> Result<bool, BrokerError> {
        let Some(pending) = self.take_matching(job_id, tool_use_id) else {
            return Ok(false);
        };

        let request = ApproveRequest { tool_use_id: tool_use_id.to_string(), approved: false, auto_approve_tool: false };
        if let Err(e) = self.runner.approve(job_id, request).await {
            warn!(%job_id, error = %e, "approve RPC to runner failed");
        }

        self.sink.on_decision(job_id, &pending, false, false, message_ts);
        Ok(true)
    }

    /// Handle a text reply in a job's thread: `yes`/`y`/`approve`/`ok`/`go`
    /// approves, `no`/`n`/`deny`/`reject`/`stop` denies, anything else is a
    /// no-op. Returns whether the reply matched a pending approval and a
    /// recognized word. Always posts a new UI message rather than editing
    /// (there is no button-prompt `message_ts` for a typed reply).
    pub async fn handle_text_reply(&self, job_id: &JobId, text: &str) -> Result<bool, BrokerError>
    where
        C: Clock,
    {
        let Some(pending) = self.pending(job_id) else {
            return Ok(false);
        };

        match text.trim().to_lowercase().as_str() {
            "yes" | "y" | "approve" | "ok" | "go" => self.handle_approve(job_id, &pending.tool_use_id, false, "").await,
            "no" | "n" | "deny" | "reject" | "stop" => self.handle_deny(job_id, &pending.tool_use_id, "").await,
            _ => Ok(false),
        }
    }

    fn take_matching(&self, job_id: &JobId, tool_use_id: &str) -> Option<PendingApproval> {
        let mut table = self.pending.lock();
        match table.get(job_id) {
            Some(entry) if entry.tool_use_id == tool_use_id => table.remove(job_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
