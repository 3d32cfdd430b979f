// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session supervisor: drives one LLM conversation per job, maps its
//! events onto the wire protocol, and gates dangerous tool calls through an
//! approval rendezvous.
//!
//! Grounded in `src/poc/agent.py`'s `AgentSession`. The background thread +
//! its own asyncio loop becomes one `tokio::spawn`ed task; the
//! `asyncio.Event`-based approval wait becomes a single-slot
//! `tokio::sync::Notify` guarding a `Mutex<Option<ApprovalDecision>>`
//! (Rust's `Notify` carries no payload, so the decision is written before
//! waking, same "write state, then signal" order the Python code follows);
//! the `_queued_messages` poll loop becomes an `mpsc::unbounded_channel`,
//! since a channel needs no polling workaround across async tasks the way
//! cross-thread signaling in Python did.

use std::collections::HashSet;
use std::sync::Arc;

use oj_core::{JobId, SessionStatus};
use oj_wire::{CompletedStatus, Event, EventEnvelope};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::Duration;
use tracing::info;

use crate::event_sink::EventSink;
use crate::llm::{LlmClient, LlmEvent, LlmTurnInput};

/// Tools that require human approval before the driver may run them.
/// Configurable per spec.md §4.5 step 1 ("configurable set"); this is the
/// default, matching `agent.py`'s `APPROVAL_REQUIRED_TOOLS`.
pub const DEFAULT_APPROVAL_REQUIRED_TOOLS: [&str; 3] = ["Bash", "Write", "Edit"];

pub const DEFAULT_APPROVAL_TIMEOUT_S: u64 = 600;

const SYSTEM_PROMPT: &str = "You are an autonomous agent completing a single job end to end.";

/// Everything needed to start a session, mirroring the fields of the
/// `/jobs/{id}/start` request plus the job id from the path.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub job_id: JobId,
    pub goal: String,
    pub model: String,
    pub callback_url: String,
    pub max_turns: u32,
    pub approval_timeout_s: u64,
    pub approved_tools: HashSet<String>,
}

/// A view of a pending approval, exposed through `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub tool_use_id: String,
    pub tool_name: String,
}

#[derive(Debug, Clone, Copy)]
struct ApprovalDecision {
    approved: bool,
    auto_approve_tool: bool,
}

/// `cancel_requested`/`end_requested` grouped in one lock, mirroring
/// `AgentSession`'s single dataclass holding both flags — they are always
/// read and written together at every check point in the loop.
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    cancel_requested: bool,
    end_requested: bool,
}

struct Shared {
    job_id: JobId,
    model: String,
    callback_url: String,
    max_turns: u32,
    approval_timeout_s: u64,
    approval_required_tools: HashSet<String>,

    approved_tools: Mutex<HashSet<String>>,
    pending_approval: Mutex<Option<PendingApproval>>,
    approval_decision: Mutex<Option<ApprovalDecision>>,
    flags: Mutex<Flags>,
    notify: Notify,

    iteration: Mutex<u32>,
    status: Mutex<SessionStatus>,
    result_text: Mutex<String>,
    message_tx: mpsc::UnboundedSender<String>,
}

/// A handle to one running (or finished) session. Cheap to clone; every
/// clone shares the same underlying state, the way the teacher's adapters
/// hand out `Arc`-backed handles rather than the session object itself.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Start a session: spawns the main loop on its own task and returns a
    /// handle immediately, the way `AgentSession.start()` spawns its
    /// background thread and returns before the goal finishes.
    pub fn spawn(
        config: SessionConfig,
        llm: Box<dyn LlmClient>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            job_id: config.job_id.clone(),
            model: config.model.clone(),
            callback_url: config.callback_url.clone(),
            max_turns: config.max_turns,
            approval_timeout_s: config.approval_timeout_s,
            approval_required_tools: DEFAULT_APPROVAL_REQUIRED_TOOLS.iter().map(|s| s.to_string()).collect(),
            approved_tools: Mutex::new(config.approved_tools.clone()),
            pending_approval: Mutex::new(None),
            approval_decision: Mutex::new(None),
            flags: Mutex::new(Flags::default()),
            notify: Notify::new(),
            iteration: Mutex::new(0),
            status: Mutex::new(SessionStatus::Pending),
            result_text: Mutex::new(String::new()),
            message_tx,
        });

        let session = Session { shared: Arc::clone(&shared) };
        let goal = config.goal;
        tokio::spawn(run_loop(shared, llm, goal, message_rx, sink));
        session
    }

    pub fn job_id(&self) -> &JobId {
        &self.shared.job_id
    }

    pub fn status(&self) -> SessionStatus {
        *self.shared.status.lock()
    }

    pub fn iteration(&self) -> u32 {
        *self.shared.iteration.lock()
    }

    pub fn max_turns(&self) -> u32 {
        self.shared.max_turns
    }

    pub fn model(&self) -> &str {
        &self.shared.model
    }

    pub fn result_text(&self) -> String {
        self.shared.result_text.lock().clone()
    }

    pub fn pending_approval(&self) -> Option<PendingApproval> {
        self.shared.pending_approval.lock().clone()
    }

    /// Resolve a pending approval as granted. Returns `false` unless
    /// `pending_approval.tool_use_id == tool_use_id` (spec.md §4.5).
    pub fn approve(&self, tool_use_id: &str, auto_approve_tool: bool) -> bool {
        let pending = self.shared.pending_approval.lock().clone();
        let Some(pending) = pending.filter(|p| p.tool_use_id == tool_use_id) else {
            return false;
        };
        if auto_approve_tool {
            self.shared.approved_tools.lock().insert(pending.tool_name);
        }
        *self.shared.approval_decision.lock() = Some(ApprovalDecision { approved: true, auto_approve_tool });
        self.shared.notify.notify_one();
        true
    }

    /// Resolve a pending approval as denied. Symmetric to [`Session::approve`].
    pub fn deny(&self, tool_use_id: &str) -> bool {
        let pending = self.shared.pending_approval.lock().clone();
        if pending.filter(|p| p.tool_use_id == tool_use_id).is_none() {
            return false;
        }
        *self.shared.approval_decision.lock() = Some(ApprovalDecision { approved: false, auto_approve_tool: false });
        self.shared.notify.notify_one();
        true
    }

    /// Queue a follow-up message for the `waiting_input` state.
    pub fn add_message(&self, message: impl Into<String>) {
        let _ = self.shared.message_tx.send(message.into());
        self.shared.notify.notify_one();
    }

    pub fn cancel(&self) {
        self.shared.flags.lock().cancel_requested = true;
        self.shared.notify.notify_waiters();
    }

    pub fn end(&self) {
        self.shared.flags.lock().end_requested = true;
        self.shared.notify.notify_waiters();
    }
}

/// Owns the boxed `LlmClient` for the lifetime of the loop — moved in by
/// `Session::spawn` rather than shared, so the public `Session` handle stays
/// `Clone` without wrapping the driver in a lock only the loop ever needs.
async fn run_loop(
    shared: Arc<Shared>,
    mut llm: Box<dyn LlmClient>,
    goal: String,
    mut message_rx: mpsc::UnboundedReceiver<String>,
    sink: Arc<dyn EventSink>,
) {
    *shared.status.lock() = SessionStatus::Running;
    emit(&shared, &sink, Event::progress(shared.job_id.clone(), "Agent started", None)).await;

    let mut pending_message = Some(goal);

    loop {
        let Some(message) = pending_message.take() else {
            break;
        };

        let iteration = {
            let mut iteration = shared.iteration.lock();
            *iteration += 1;
            *iteration
        };

        if iteration > shared.max_turns {
            emit(
                &shared,
                &sink,
                Event::completed(shared.job_id.clone(), CompletedStatus::MaxIterations, Some("max turns reached".into())),
            )
            .await;
            *shared.status.lock() = SessionStatus::Completed;
            return;
        }

        let turn = llm.run_turn(LlmTurnInput {
            model: shared.model.clone(),
            message,
            system_prompt: SYSTEM_PROMPT.to_string(),
        })
        .await;

        let events = match turn {
            Ok(events) => events,
            Err(e) => {
                *shared.result_text.lock() = e.to_string();
                *shared.status.lock() = SessionStatus::Failed;
                emit(&shared, &sink, Event::failed(shared.job_id.clone(), e.to_string())).await;
                return;
            }
        };

        for event in events {
            if shared.flags.lock().cancel_requested {
                *shared.status.lock() = SessionStatus::Cancelled;
                emit(&shared, &sink, Event::completed(shared.job_id.clone(), CompletedStatus::Cancelled, None)).await;
                return;
            }
            if shared.flags.lock().end_requested {
                emit(&shared, &sink, Event::session_ended(shared.job_id.clone(), "ended by request")).await;
                *shared.status.lock() = SessionStatus::Completed;
                return;
            }

            match event {
                LlmEvent::Text(text) => {
                    emit(&shared, &sink, Event::progress(shared.job_id.clone(), text, Some(iteration))).await;
                }
                LlmEvent::Thinking(thinking) => {
                    emit(&shared, &sink, Event::thinking(shared.job_id.clone(), iteration, thinking)).await;
                }
                LlmEvent::ToolUse { tool_use_id, tool_name, tool_input } => {
                    if requires_approval(&shared, &tool_name) {
                        let outcome = check_permission(&shared, &sink, &tool_name, &tool_input, iteration).await;
                        if !outcome {
                            continue;
                        }
                    }
                    emit(&shared, &sink, Event::tool_call(shared.job_id.clone(), tool_name, tool_input, tool_use_id)).await;
                }
                LlmEvent::ToolResult { tool_use_id, tool_name, result_preview } => {
                    emit(&shared, &sink, Event::tool_result(shared.job_id.clone(), tool_use_id, tool_name, result_preview)).await;
                }
                LlmEvent::Result { message, num_turns, duration_ms, total_cost_usd, is_error } => {
                    if is_error {
                        *shared.result_text.lock() = message.clone();
                        *shared.status.lock() = SessionStatus::Failed;
                        emit(&shared, &sink, Event::failed(shared.job_id.clone(), message)).await;
                        return;
                    }

                    *shared.result_text.lock() = message.clone();
                    emit(
                        &shared,
                        &sink,
                        Event::assistant_response(shared.job_id.clone(), message, num_turns, duration_ms, total_cost_usd),
                    )
                    .await;

                    if let Ok(next) = message_rx.try_recv() {
                        pending_message = Some(next);
                        break;
                    }

                    *shared.status.lock() = SessionStatus::WaitingInput;
                    emit(&shared, &sink, Event::waiting_input(shared.job_id.clone())).await;

                    pending_message = wait_for_message(&shared, &sink, &mut message_rx).await;
                    if pending_message.is_none() {
                        return;
                    }
                    *shared.status.lock() = SessionStatus::Running;
                    break;
                }
            }
        }
    }

    *shared.status.lock() = SessionStatus::Completed;
}

/// Block until a follow-up message arrives, or `cancel`/`end` is requested.
/// Returns `None` when the session should exit (already emitted its
/// terminal event).
async fn wait_for_message(
    shared: &Arc<Shared>,
    sink: &Arc<dyn EventSink>,
    message_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Option<String> {
    loop {
        if shared.flags.lock().cancel_requested {
            *shared.status.lock() = SessionStatus::Cancelled;
            emit(shared, sink, Event::completed(shared.job_id.clone(), CompletedStatus::Cancelled, None)).await;
            return None;
        }
        if shared.flags.lock().end_requested {
            emit(shared, sink, Event::session_ended(shared.job_id.clone(), "ended by request")).await;
            *shared.status.lock() = SessionStatus::Completed;
            return None;
        }

        tokio::select! {
            message = message_rx.recv() => {
                return message;
            }
            _ = shared.notify.notified() => {
                continue;
            }
        }
    }
}

fn requires_approval(shared: &Arc<Shared>, tool_name: &str) -> bool {
    if !shared.approval_required_tools.contains(tool_name) {
        return false;
    }
    !shared.approved_tools.lock().contains(tool_name)
}

/// The permission callback (spec.md §4.5): install a pending approval,
/// announce it, and wait on the rendezvous up to `approval_timeout_s`.
/// Returns whether the tool call is allowed to proceed.
async fn check_permission(
    shared: &Arc<Shared>,
    sink: &Arc<dyn EventSink>,
    tool_name: &str,
    tool_input: &str,
    iteration: u32,
) -> bool {
    let tool_use_id = format!("sdk-{}-{}-{}", shared.job_id, iteration, tool_name);
    *shared.pending_approval.lock() = Some(PendingApproval { tool_use_id: tool_use_id.clone(), tool_name: tool_name.to_string() });
    *shared.approval_decision.lock() = None;
    *shared.status.lock() = SessionStatus::WaitingApproval;
    emit(shared, sink, Event::approval_needed(shared.job_id.clone(), tool_use_id.clone(), tool_name, tool_input)).await;

    let timeout = Duration::from_secs(shared.approval_timeout_s);
    let wait_result = tokio::time::timeout(timeout, wait_for_decision(shared)).await;

    shared.pending_approval.lock().take();

    match wait_result {
        Err(_) => {
            emit(
                shared,
                sink,
                Event::approval_timeout(shared.job_id.clone(), tool_use_id, tool_name, shared.approval_timeout_s),
            )
            .await;
            *shared.status.lock() = SessionStatus::Running;
            false
        }
        Ok(Decision::Cancelled) | Ok(Decision::Ended) => false,
        Ok(Decision::Resolved(decision)) => {
            *shared.status.lock() = SessionStatus::Running;
            decision.approved
        }
    }
}

enum Decision {
    Resolved(ApprovalDecision),
    Cancelled,
    Ended,
}

async fn wait_for_decision(shared: &Arc<Shared>) -> Decision {
    loop {
        if let Some(decision) = shared.approval_decision.lock().take() {
            return Decision::Resolved(decision);
        }
        if shared.flags.lock().cancel_requested {
            return Decision::Cancelled;
        }
        if shared.flags.lock().end_requested {
            return Decision::Ended;
        }
        shared.notify.notified().await;
    }
}

async fn emit(shared: &Arc<Shared>, sink: &Arc<dyn EventSink>, event: EventEnvelope) {
    info!(job_id = %shared.job_id, event_type = %event.event_type, "session event");
    sink.emit(&shared.callback_url, &event).await;
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
