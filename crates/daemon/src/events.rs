// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller's HTTP surface for the runner: `POST /events` plus
//! `GET /health` (spec.md §4.6's second table).
//!
//! Grounded in the teacher's `listener/mod.rs` dispatch split, with the
//! event-handling policy itself ported from `jobs.py`'s event-callback
//! (one `match` per `event_type`, mutating the persisted `Job` and poking
//! the queue/broker). Every branch is idempotent by construction — it sets
//! fields to an absolute value or calls a queue/broker method that is
//! already a documented no-op on a stale or duplicate delivery — satisfying
//! the at-least-once delivery contract without any sequence-number bookkeeping.

use std::sync::Arc;

use oj_core::{JobId, Phase};
use oj_engine::{ApprovalBroker, JobQueue};
use oj_storage::JobStore;
use oj_wire::{CompletedStatus, EventData, EventEnvelope, EventKind};
use oj_transport::{Handler, Method, Request, Response};
use tracing::{info, warn};

/// Everything the `/events` handler needs: the queue and broker, sharing
/// one job store between them.
pub struct ControllerState {
    pub queue: JobQueue,
    pub broker: ApprovalBroker,
}

impl ControllerState {
    pub fn new(queue: JobQueue, broker: ApprovalBroker) -> Arc<Self> {
        Arc::new(Self { queue, broker })
    }

    fn store(&self) -> &JobStore {
        self.queue.store()
    }
}

/// Build a [`Handler`] closure bound to `state`, ready for `oj_transport::serve`.
pub fn make_handler(state: Arc<ControllerState>) -> impl Handler {
    move |request: Request| {
        let state = Arc::clone(&state);
        async move { route(&state, request).await }
    }
}

async fn route(state: &Arc<ControllerState>, request: Request) -> Response {
    match (request.method, request.path.as_str()) {
        (Method::Get, "/health") => Response::ok(r#"{"status":"ok","service":"controller"}"#),
        (Method::Post, "/events") => {
            handle_events_post(state, &request.body).await;
            // Per spec.md §4.6: handler exceptions must not break the
            // connection — always 200 so the runner isn't induced to retry
            // pointlessly. At-least-once delivery is upheld on the wire, not
            // by making the runner guess whether the effect landed.
            Response::ok(r#"{"status":"ok"}"#)
        }
        _ => Response::new(404, r#"{"error":"unknown route"}"#),
    }
}

async fn handle_events_post(state: &Arc<ControllerState>, body: &str) {
    let envelope: EventEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed event envelope; dropping");
            return;
        }
    };
    handle_event(state, envelope).await;
}

/// Dispatches on `event_type` rather than the parsed, untagged `data`
/// payload: `waiting_input` carries no data and therefore parses to the same
/// [`EventData::Empty`] shape as an envelope this build can't interpret, so
/// only `event_type` tells the two apart.
async fn handle_event(state: &Arc<ControllerState>, envelope: EventEnvelope) {
    let job_id = envelope.job_id.clone();
    let event_type = envelope.event_type.clone();
    let data = envelope.parsed_data();

    macro_rules! require_data {
        () => {
            match data {
                Some(data) => data,
                None => {
                    warn!(%job_id, %event_type, "event payload didn't match its event_type; dropping");
                    return;
                }
            }
        };
    }

    match event_type {
        EventKind::ApprovalNeeded => {
            let EventData::ApprovalNeeded { tool_use_id, tool_name, .. } = require_data!() else {
                warn!(%job_id, %event_type, "unexpected payload shape; dropping");
                return;
            };
            state.broker.register_pending(job_id.clone(), tool_use_id, tool_name, String::new(), String::new());
            set_phase(state, &job_id, Phase::WaitingApproval, None);
        }
        EventKind::ApprovalTimeout => {
            state.broker.clear(&job_id);
            info!(%job_id, "approval timed out on the runner; clearing pending entry");
            set_phase(state, &job_id, Phase::Running, None);
        }
        EventKind::WaitingInput => {
            set_phase(state, &job_id, Phase::WaitingInput, None);
        }
        EventKind::TokenUsage => {
            let EventData::TokenUsage { input_tokens, output_tokens, .. } = require_data!() else {
                warn!(%job_id, %event_type, "unexpected payload shape; dropping");
                return;
            };
            mutate_job(state, &job_id, |job| job.accumulate_tokens(input_tokens, output_tokens));
        }
        EventKind::Completed => {
            let EventData::Completed { status, .. } = require_data!() else {
                warn!(%job_id, %event_type, "unexpected payload shape; dropping");
                return;
            };
            let phase = match status {
                CompletedStatus::Completed => Phase::Done,
                CompletedStatus::Cancelled => Phase::Cancelled,
                CompletedStatus::MaxIterations => {
                    warn!(%job_id, "session stopped at max_turns");
                    Phase::Done
                }
            };
            set_phase(state, &job_id, phase, None);
            state.broker.clear(&job_id);
            state.queue.mark_completed(&job_id);
        }
        EventKind::Failed => {
            let EventData::Failed { error } = require_data!() else {
                warn!(%job_id, %event_type, "unexpected payload shape; dropping");
                return;
            };
            set_phase(state, &job_id, Phase::Failed, Some(error));
            state.broker.clear(&job_id);
            state.queue.mark_completed(&job_id);
        }
        EventKind::SessionEnded => {
            set_phase(state, &job_id, Phase::Done, None);
            state.broker.clear(&job_id);
            state.queue.mark_completed(&job_id);
        }
        // progress / thinking / tool_call / tool_result / assistant_response
        // carry no controller-side state mutation beyond what's already
        // visible through `/jobs/{id}/status` on the runner; the controller
        // only needs them for rendering a chat update, which is the
        // front-end's concern (spec.md §1), not this crate's.
        EventKind::Progress
        | EventKind::Thinking
        | EventKind::ToolCall
        | EventKind::ToolResult
        | EventKind::AssistantResponse => {}
        EventKind::Unknown(_) => {
            warn!(%job_id, %event_type, "unknown event_type; dropping");
        }
    }
}

fn set_phase(state: &Arc<ControllerState>, job_id: &JobId, phase: Phase, error: Option<String>) {
    mutate_job(state, job_id, |job| {
        job.phase = phase;
        if error.is_some() {
            job.error = error.clone();
        }
    });
}

fn mutate_job(state: &Arc<ControllerState>, job_id: &JobId, f: impl FnOnce(&mut oj_storage::Job)) {
    let mut job = match state.store().load(job_id) {
        Ok(job) => job,
        Err(e) => {
            warn!(%job_id, error = %e, "event for unknown or unreadable job; dropping");
            return;
        }
    };
    f(&mut job);
    if let Err(e) = state.store().save(&job) {
        warn!(%job_id, error = %e, "failed to persist job after event");
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
