// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level integration tests exercising the controller crates
//! (`oj-storage`, `oj-engine`, `oj-daemon`, `oj-wire`, `oj-transport`)
//! together over a real HTTP loopback connection, covering spec.md §8's
//! seed scenarios and universal invariants end to end rather than through
//! any one crate's in-process unit tests alone.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use oj_core::Phase;
use oj_daemon::{make_handler, ControllerState};
use oj_engine::{recover_crashed_jobs, ApprovalBroker, FakeRunnerClient, JobQueue, RunnerClient};
use oj_storage::JobStore;
use oj_wire::{CompletedStatus, Event};
use tempfile::TempDir;

struct Harness {
    state: Arc<ControllerState>,
    store: JobStore,
    addr: String,
    _tmp: TempDir,
}

async fn harness() -> Harness {
    let tmp = TempDir::new().expect("tempdir");
    let store = JobStore::new(tmp.path());
    let runner: Arc<dyn RunnerClient> = Arc::new(FakeRunnerClient::new());
    let queue = JobQueue::new(store.clone(), Arc::clone(&runner), "http://controller/events");
    let broker = ApprovalBroker::new(store.clone(), Arc::clone(&runner));
    let state = ControllerState::new(queue, broker);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr").to_string();
    let handler = Arc::new(make_handler(Arc::clone(&state)));
    tokio::spawn(oj_transport::serve(listener, handler));

    Harness { state, store, addr, _tmp: tmp }
}

async fn post_event(addr: &str, envelope: &oj_wire::EventEnvelope) {
    let body = serde_json::to_string(envelope).expect("serialize envelope");
    let response = oj_transport::post(addr, "/events", &body).await.expect("post /events");
    assert_eq!(response.status, 200);
}

async fn wait_until(store: &JobStore, job_id: &oj_core::JobId, mut pred: impl FnMut(Phase) -> bool) -> oj_storage::Job {
    for _ in 0..200 {
        let job = store.load(job_id).expect("load");
        if pred(job.phase) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for phase predicate on {job_id}");
}

/// Seed scenario 1: happy path through to a user-initiated cancel.
#[tokio::test]
async fn happy_path_runs_then_cancels() {
    let h = harness().await;
    let job = h.store.create("run my task").expect("create");

    h.state.queue.enqueue(job.job_id);
    let running = wait_until(&h.store, &job.job_id, |p| p == Phase::Running).await;
    assert_eq!(running.phase, Phase::Running);

    post_event(&h.addr, &Event::progress(job.job_id, "Agent started", Some(0))).await;
    post_event(&h.addr, &Event::assistant_response(job.job_id, "ok", 1, 500, None)).await;
    post_event(&h.addr, &Event::waiting_input(job.job_id)).await;

    let waiting = wait_until(&h.store, &job.job_id, |p| p == Phase::WaitingInput).await;
    assert_eq!(waiting.phase, Phase::WaitingInput);

    let cancelled = h.state.queue.cancel(&job.job_id).await.expect("cancel");
    assert!(cancelled);
    let job = h.store.load(&job.job_id).expect("load");
    assert_eq!(job.phase, Phase::Cancelled);
    assert!(h.state.queue.current_job_id().is_none());
}

/// Seed scenario 2: approval via button, prompt's `message_ts` threaded
/// through to the runner-bound approve call.
#[tokio::test]
async fn approval_via_button_consumes_the_pending_entry() {
    let h = harness().await;
    let job = h.store.create("do something risky").expect("create");

    post_event(&h.addr, &Event::approval_needed(job.job_id, "tu-1", "Bash", "ls")).await;
    let waiting = wait_until(&h.store, &job.job_id, |p| p == Phase::WaitingApproval).await;
    assert_eq!(waiting.phase, Phase::WaitingApproval);
    assert!(h.state.broker.pending(&job.job_id).is_some());

    let approved = h.state.broker.handle_approve(&job.job_id, "tu-1", false, "m-1").await.expect("approve");
    assert!(approved);
    assert!(h.state.broker.pending(&job.job_id).is_none());

    post_event(&h.addr, &Event::tool_result(job.job_id, "tu-1", "Bash", "total 0")).await;
}

/// Seed scenario 3: approve-all persists the tool into the job's
/// `approved_tools` set before the runner is even told.
#[tokio::test]
async fn approve_all_records_the_auto_approved_tool() {
    let h = harness().await;
    let job = h.store.create("do it repeatedly").expect("create");

    post_event(&h.addr, &Event::approval_needed(job.job_id, "tu-1", "Bash", "ls")).await;
    wait_until(&h.store, &job.job_id, |p| p == Phase::WaitingApproval).await;

    let approved = h.state.broker.handle_approve(&job.job_id, "tu-1", true, "m-1").await.expect("approve");
    assert!(approved);

    let job = h.store.load(&job.job_id).expect("load");
    assert!(job.approved_tools.contains("Bash"));
}

/// Seed scenario 4: a thread reply of "yes" resolves the pending approval
/// the same way a button click would.
#[tokio::test]
async fn text_reply_of_yes_approves_the_pending_tool() {
    let h = harness().await;
    let job = h.store.create("do something").expect("create");

    post_event(&h.addr, &Event::approval_needed(job.job_id, "tu-1", "Bash", "ls")).await;
    wait_until(&h.store, &job.job_id, |p| p == Phase::WaitingApproval).await;

    let handled = h.state.broker.handle_text_reply(&job.job_id, "yes").await.expect("text reply");
    assert!(handled);
    assert!(h.state.broker.pending(&job.job_id).is_none());
}

/// Seed scenario 5: an approval timeout clears the pending entry and
/// returns the job to RUNNING without any `tool_result` for that call.
#[tokio::test]
async fn approval_timeout_clears_pending_without_a_tool_result() {
    let h = harness().await;
    let job = h.store.create("do something slow").expect("create");

    post_event(&h.addr, &Event::approval_needed(job.job_id, "tu-1", "Bash", "sleep 600")).await;
    wait_until(&h.store, &job.job_id, |p| p == Phase::WaitingApproval).await;

    post_event(&h.addr, &Event::approval_timeout(job.job_id, "tu-1", "Bash", 600)).await;
    let recovered = wait_until(&h.store, &job.job_id, |p| p == Phase::Running).await;
    assert_eq!(recovered.phase, Phase::Running);
    assert!(h.state.broker.pending(&job.job_id).is_none());
}

/// Seed scenario 6: a job left RUNNING on disk at startup is recovered
/// into FAILED with the crash-recovery message.
#[tokio::test]
async fn crash_recovery_fails_jobs_left_running() {
    let tmp = TempDir::new().expect("tempdir");
    let store = JobStore::new(tmp.path());
    let mut job = store.create("interrupted task").expect("create");
    job.phase = Phase::Running;
    store.save(&job).expect("save");

    let recovered = recover_crashed_jobs(&store).expect("recover");
    assert_eq!(recovered, vec![job.job_id]);

    let job = store.load(&job.job_id).expect("load");
    assert_eq!(job.phase, Phase::Failed);
    assert!(job.error.as_deref().unwrap_or_default().contains("restarted while job was running"));
}

/// Universal invariant: at most one job is RUNNING across the store at
/// any instant, even with several jobs queued back to back.
#[tokio::test]
async fn at_most_one_job_is_running_at_once() {
    let h = harness().await;
    let jobs: Vec<_> = (0..4).map(|i| h.store.create(format!("task {i}")).expect("create")).collect();
    for job in &jobs {
        h.state.queue.enqueue(job.job_id);
    }

    // Give the queue's detached dispatch tasks a chance to run; only one
    // should ever be promoted to RUNNING until it finishes.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let running_count = h
        .store
        .list()
        .expect("list")
        .iter()
        .map(|id| h.store.load(id).expect("load").phase)
        .filter(|p| *p == Phase::Running)
        .count();
    assert!(running_count <= 1, "expected at most one RUNNING job, saw {running_count}");
}

/// Universal invariant: every terminal event clears `current_job_id` and,
/// with another job queued, promotes it to RUNNING.
#[tokio::test]
async fn terminal_event_clears_current_and_promotes_next() {
    let h = harness().await;
    let first = h.store.create("first task").expect("create");
    let second = h.store.create("second task").expect("create");

    h.state.queue.enqueue(first.job_id);
    h.state.queue.enqueue(second.job_id);
    wait_until(&h.store, &first.job_id, |p| p == Phase::Running).await;
    assert_eq!(h.state.queue.current_job_id(), Some(first.job_id));

    post_event(&h.addr, &Event::completed(first.job_id, CompletedStatus::Completed, None)).await;

    wait_until(&h.store, &second.job_id, |p| p == Phase::Running).await;
    assert_eq!(h.state.queue.current_job_id(), Some(second.job_id));

    let first = h.store.load(&first.job_id).expect("load");
    assert_eq!(first.phase, Phase::Done);
}

/// Universal invariant: `save(load(x))` with no field changes is
/// idempotent modulo `updated_at`.
#[tokio::test]
async fn save_then_load_is_idempotent_modulo_updated_at() {
    let h = harness().await;
    let job = h.store.create("idempotence check").expect("create");

    let reloaded = h.store.load(&job.job_id).expect("load");
    h.store.save(&reloaded).expect("save");
    let reloaded_again = h.store.load(&job.job_id).expect("load");

    let mut a = reloaded.clone();
    let mut b = reloaded_again.clone();
    a.updated_at.clear();
    b.updated_at.clear();
    assert_eq!(a, b);
}

/// Universal invariant: the first `approve` call for a `tool_use_id` wins;
/// every subsequent call for the same (already-consumed) id is a no-op.
#[tokio::test]
async fn first_approve_wins_subsequent_calls_are_no_ops() {
    let h = harness().await;
    let job = h.store.create("do something").expect("create");

    post_event(&h.addr, &Event::approval_needed(job.job_id, "tu-1", "Bash", "ls")).await;
    wait_until(&h.store, &job.job_id, |p| p == Phase::WaitingApproval).await;

    let first = h.state.broker.handle_approve(&job.job_id, "tu-1", false, "m-1").await.expect("approve");
    let second = h.state.broker.handle_approve(&job.job_id, "tu-1", false, "m-2").await.expect("approve");
    assert!(first);
    assert!(!second);
}
