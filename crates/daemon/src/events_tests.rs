use std::sync::Arc;

use oj_core::Phase;
use oj_engine::{ApprovalBroker, FakeRunnerClient, JobQueue};
use oj_storage::JobStore;
use oj_transport::{Handler, Method, Request};
use tempfile::TempDir;

use super::{make_handler, ControllerState};

fn state() -> (Arc<ControllerState>, JobStore, TempDir) {
    let tmp = TempDir::new().expect("tempdir");
    let store = JobStore::new(tmp.path());
    let runner = Arc::new(FakeRunnerClient::new());
    let queue = JobQueue::new(store.clone(), runner.clone(), "http://controller/events");
    let broker = ApprovalBroker::new(store.clone(), runner);
    (ControllerState::new(queue, broker), store, tmp)
}

fn post(path: &str, body: &str) -> Request {
    Request { method: Method::Post, path: path.to_string(), body: body.to_string() }
}

fn event_body(job_id: &str, event_type: &str, data: serde_json::Value) -> String {
    serde_json::json!({
        "job_id": job_id,
        "event_type": event_type,
        "timestamp": "2026-01-01T00:00:00Z",
        "data": data,
    })
    .to_string()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (state, _store, _tmp) = state();
    let handler = make_handler(state);
    let response = Handler::handle(&handler, Request { method: Method::Get, path: "/health".into(), body: String::new() }).await;
    assert_eq!(response.status, 200);
    assert!(response.body.contains("\"status\":\"ok\""));
}

#[tokio::test]
async fn approval_needed_registers_pending_and_sets_waiting_approval() {
    let (state, store, _tmp) = state();
    let job = store.create("do it").expect("create job");
    let handler = make_handler(Arc::clone(&state));

    let body = event_body(
        job.job_id.as_str(),
        "approval_needed",
        serde_json::json!({"tool_use_id": "sdk-1", "tool_name": "Bash", "tool_input": "ls"}),
    );
    let response = Handler::handle(&handler, post("/events", &body)).await;
    assert_eq!(response.status, 200);

    let pending = state.broker.pending(&job.job_id).expect("pending registered");
    assert_eq!(pending.tool_use_id, "sdk-1");
    assert_eq!(store.load(&job.job_id).expect("load").phase, Phase::WaitingApproval);
}

#[tokio::test]
async fn approval_timeout_clears_pending_and_restores_running() {
    let (state, store, _tmp) = state();
    let mut job = store.create("do it").expect("create job");
    job.phase = Phase::WaitingApproval;
    store.save(&job).expect("save");
    state.broker.register_pending(job.job_id.clone(), "sdk-1".into(), "Bash".into(), String::new(), String::new());
    let handler = make_handler(Arc::clone(&state));

    let body = event_body(job.job_id.as_str(), "approval_timeout", serde_json::json!({"tool_use_id": "sdk-1", "tool_name": "Bash", "timeout": 600}));
    Handler::handle(&handler, post("/events", &body)).await;

    assert!(state.broker.pending(&job.job_id).is_none());
    assert_eq!(store.load(&job.job_id).expect("load").phase, Phase::Running);
}

#[tokio::test]
async fn completed_marks_job_done_and_frees_the_queue() {
    let (state, store, _tmp) = state();
    let mut job = store.create("do it").expect("create job");
    job.phase = Phase::Running;
    store.save(&job).expect("save");
    state.queue.enqueue(job.job_id.clone());
    let handler = make_handler(Arc::clone(&state));

    let body = event_body(job.job_id.as_str(), "completed", serde_json::json!({"status": "completed"}));
    Handler::handle(&handler, post("/events", &body)).await;

    assert_eq!(store.load(&job.job_id).expect("load").phase, Phase::Done);
    assert!(state.queue.current_job_id().is_none());
}

#[tokio::test]
async fn failed_records_error_and_frees_the_queue() {
    let (state, store, _tmp) = state();
    let mut job = store.create("do it").expect("create job");
    job.phase = Phase::Running;
    store.save(&job).expect("save");
    state.queue.enqueue(job.job_id.clone());
    let handler = make_handler(Arc::clone(&state));

    let body = event_body(job.job_id.as_str(), "failed", serde_json::json!({"error": "boom"}));
    Handler::handle(&handler, post("/events", &body)).await;

    let reloaded = store.load(&job.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Failed);
    assert_eq!(reloaded.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn token_usage_accumulates_onto_the_job() {
    let (state, store, _tmp) = state();
    let job = store.create("do it").expect("create job");
    let handler = make_handler(Arc::clone(&state));

    let body = event_body(job.job_id.as_str(), "token_usage", serde_json::json!({"input_tokens": 10, "output_tokens": 20, "iteration": 1}));
    Handler::handle(&handler, post("/events", &body)).await;

    let reloaded = store.load(&job.job_id).expect("load");
    assert_eq!(reloaded.input_tokens, 10);
    assert_eq!(reloaded.output_tokens, 20);
}

#[tokio::test]
async fn event_for_unknown_job_is_logged_and_ignored_not_fatal() {
    let (state, _store, _tmp) = state();
    let handler = make_handler(Arc::clone(&state));

    let body = event_body("20260101-000000-dead", "progress", serde_json::json!({"message": "hi"}));
    let response = Handler::handle(&handler, post("/events", &body)).await;

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn malformed_body_still_returns_200() {
    let (state, _store, _tmp) = state();
    let handler = make_handler(state);

    let response = Handler::handle(&handler, post("/events", "not json")).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (state, _store, _tmp) = state();
    let handler = make_handler(state);

    let response = Handler::handle(&handler, Request { method: Method::Get, path: "/bogus".into(), body: String::new() }).await;
    assert_eq!(response.status, 404);
}
