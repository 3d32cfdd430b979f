// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner's HTTP route table: `jobs/{id}/{start,approve,message,cancel,
//! end,status}` plus `/health`, dispatched over `oj_transport::serve`.
//!
//! Grounded in the teacher's `ListenCtx`/`handle_request` split
//! (`crates/daemon/src/listener/mod.rs`): one `Arc`-shared context struct, one
//! `match` over the parsed request routing to a handler function per route,
//! errors converted to the matching status code at this boundary rather than
//! deep inside session logic.

use std::collections::HashMap;
use std::sync::Arc;

use oj_core::JobId;
use oj_transport::{Handler, Method, Request, Response};
use oj_wire::{
    ApproveRequest, ApproveResponse, ErrorBody, MessageRequest, MessageResponse,
    PendingApprovalView, StartRequest, StartResponse, StatusResponse,
};
use parking_lot::Mutex;
use tracing::info;

use crate::event_sink::EventSink;
use crate::llm::LlmClient;
use crate::session::{Session, SessionConfig, DEFAULT_APPROVAL_TIMEOUT_S};

/// Mirrors `oj_storage::job::DEFAULT_MODEL` — kept as a local constant rather
/// than a dependency on the storage crate, since the runner has no other
/// reason to link against controller-side persistence.
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TURNS: u32 = 200;
const RESULT_TEXT_MAX: usize = 2000;

/// Constructs a fresh [`LlmClient`] for each new session. A factory rather
/// than a shared instance because every job gets its own conversation state.
pub type LlmClientFactory = Arc<dyn Fn() -> Box<dyn LlmClient> + Send + Sync>;

/// Shared server state: the session registry plus what every session needs
/// to be built. Per spec.md §5, this registry is the only cross-session
/// shared mutable state the runner carries.
pub struct RunnerState {
    sessions: Mutex<HashMap<JobId, Session>>,
    llm_factory: LlmClientFactory,
    event_sink: Arc<dyn EventSink>,
}

impl RunnerState {
    pub fn new(llm_factory: LlmClientFactory, event_sink: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self { sessions: Mutex::new(HashMap::new()), llm_factory, event_sink })
    }

    fn get(&self, job_id: &JobId) -> Option<Session> {
        self.sessions.lock().get(job_id).cloned()
    }
}

/// Build a [`Handler`] closure bound to `state`, ready for
/// `oj_transport::serve`.
pub fn make_handler(state: Arc<RunnerState>) -> impl Handler {
    move |request: Request| {
        let state = Arc::clone(&state);
        async move { route(&state, request).await }
    }
}

async fn route(state: &Arc<RunnerState>, request: Request) -> Response {
    match (request.method, request.path.as_str()) {
        (Method::Get, "/health") => Response::ok(r#"{"status":"ok","service":"runner"}"#),
        _ => route_job(state, &request).await,
    }
}

async fn route_job(state: &Arc<RunnerState>, request: &Request) -> Response {
    let Some((job_id, action)) = parse_job_route(&request.path) else {
        return not_found(&request.path);
    };

    match (request.method, action) {
        (Method::Post, "start") => handle_start(state, job_id, &request.body).await,
        (Method::Post, "approve") => handle_approve(state, &job_id, &request.body),
        (Method::Post, "message") => handle_message(state, &job_id, &request.body),
        (Method::Post, "cancel") => handle_cancel(state, &job_id),
        (Method::Post, "end") => handle_end(state, &job_id),
        (Method::Get, "status") => handle_status(state, &job_id),
        _ => not_found(&request.path),
    }
}

fn parse_job_route(path: &str) -> Option<(JobId, &str)> {
    let rest = path.strip_prefix("/jobs/")?;
    let mut parts = rest.splitn(2, '/');
    let id = parts.next()?;
    let action = parts.next()?;
    if id.is_empty() || action.is_empty() {
        return None;
    }
    Some((JobId::from_string(id), action))
}

async fn handle_start(state: &Arc<RunnerState>, job_id: JobId, body: &str) -> Response {
    let req: StartRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };
    if req.goal.trim().is_empty() {
        return bad_request("missing required field: goal");
    }
    if let Some(existing) = state.get(&job_id) {
        if !existing.status().is_terminal() {
            return conflict("job already running");
        }
    }

    let model = req.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let config = SessionConfig {
        job_id: job_id.clone(),
        goal: req.goal,
        model: model.clone(),
        callback_url: req.callback_url,
        max_turns: req.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
        approval_timeout_s: req.approval_timeout.unwrap_or(DEFAULT_APPROVAL_TIMEOUT_S),
        approved_tools: Default::default(),
    };

    info!(%job_id, %model, "starting session");
    let llm = (state.llm_factory)();
    let session = Session::spawn(config, llm, Arc::clone(&state.event_sink));
    state.sessions.lock().insert(job_id.clone(), session);

    json_ok(&StartResponse { job_id: job_id.to_string(), status: "started".into(), model })
}

fn handle_approve(state: &Arc<RunnerState>, job_id: &JobId, body: &str) -> Response {
    let Some(session) = state.get(job_id) else {
        return not_found_job(job_id);
    };
    let req: ApproveRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };

    let matched = if req.approved {
        session.approve(&req.tool_use_id, req.auto_approve_tool)
    } else {
        session.deny(&req.tool_use_id)
    };
    if !matched {
        return bad_request("no matching pending approval");
    }

    json_ok(&ApproveResponse { status: "ok".into(), approved: req.approved })
}

fn handle_message(state: &Arc<RunnerState>, job_id: &JobId, body: &str) -> Response {
    let Some(session) = state.get(job_id) else {
        return not_found_job(job_id);
    };
    let req: MessageRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };
    if req.message.trim().is_empty() {
        return bad_request("empty message");
    }

    session.add_message(req.message);
    json_ok(&MessageResponse { status: "message_added".into() })
}

fn handle_cancel(state: &Arc<RunnerState>, job_id: &JobId) -> Response {
    let Some(session) = state.get(job_id) else {
        return not_found_job(job_id);
    };
    session.cancel();
    json_ok(&MessageResponse { status: "cancel_requested".into() })
}

fn handle_end(state: &Arc<RunnerState>, job_id: &JobId) -> Response {
    let Some(session) = state.get(job_id) else {
        return not_found_job(job_id);
    };
    session.end();
    json_ok(&MessageResponse { status: "end_requested".into() })
}

fn handle_status(state: &Arc<RunnerState>, job_id: &JobId) -> Response {
    let Some(session) = state.get(job_id) else {
        return not_found_job(job_id);
    };

    let pending_approval = session.pending_approval().map(|p| PendingApprovalView {
        tool_use_id: p.tool_use_id,
        tool_name: p.tool_name,
    });
    let response = StatusResponse {
        job_id: job_id.to_string(),
        status: session.status().to_string(),
        iteration: session.iteration(),
        max_turns: session.max_turns(),
        model: session.model().to_string(),
        result_text: truncate(&session.result_text(), RESULT_TEXT_MAX),
        pending_approval,
    };
    json_ok(&response)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn json_ok(body: &impl serde::Serialize) -> Response {
    match serde_json::to_string(body) {
        Ok(body) => Response::ok(body),
        Err(e) => internal_error(e.to_string()),
    }
}

fn error_response(status: u16, message: impl Into<String>) -> Response {
    let body = ErrorBody { error: message.into() };
    let body = serde_json::to_string(&body).unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string());
    Response::new(status, body)
}

fn bad_request(message: impl Into<String>) -> Response {
    error_response(400, message)
}

fn conflict(message: impl Into<String>) -> Response {
    error_response(409, message)
}

fn not_found(path: &str) -> Response {
    error_response(404, format!("unknown route: {path}"))
}

fn not_found_job(job_id: &JobId) -> Response {
    error_response(404, format!("no session for job {job_id}"))
}

fn internal_error(message: impl Into<String>) -> Response {
    error_response(500, message)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
