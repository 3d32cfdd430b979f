use std::sync::Arc;
use std::time::Duration;

use oj_core::{FakeClock, Phase};
use oj_storage::JobStore;
use tempfile::TempDir;
use yare::parameterized;

use super::{recover_crashed_jobs, JobQueue};
use crate::callback::{LifecycleCall, RecordingLifecycleCallback};
use crate::runner_client::{FakeRunnerClient, RunnerCall};

fn new_store() -> (TempDir, JobStore<FakeClock>) {
    let dir = TempDir::new().expect("tempdir");
    let store = JobStore::with_clock(dir.path(), FakeClock::new());
    (dir, store)
}

/// Spawned dispatch tasks run on the same executor; yield a handful of
/// times so they get a chance to complete before we assert on their effects.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn enqueue_with_no_current_job_starts_immediately() {
    let (_dir, store) = new_store();
    let job = store.create("do the thing").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let callback = Arc::new(RecordingLifecycleCallback::new());
    let queue = JobQueue::with_callback(store.clone(), runner.clone(), "http://callback", callback.clone());

    let position = queue.enqueue(job.job_id.clone());
    assert_eq!(position, 0);
    settle().await;

    assert_eq!(queue.current_job_id(), Some(job.job_id.clone()));
    assert!(queue.has_active_session());
    let reloaded = store.load(&job.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Running);
    assert_eq!(runner.calls(), vec![RunnerCall::Start { job_id: job.job_id.to_string(), goal: job.goal.clone() }]);
    assert_eq!(callback.calls(), vec![LifecycleCall::Started(job.job_id.to_string())]);
}

#[tokio::test]
async fn second_enqueue_while_busy_stays_queued() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let second = store.create("second").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let queue = JobQueue::new(store.clone(), runner, "http://callback");

    queue.enqueue(first.job_id.clone());
    settle().await;
    let position = queue.enqueue(second.job_id.clone());

    assert_eq!(position, 0);
    assert_eq!(queue.current_job_id(), Some(first.job_id));
    assert_eq!(queue.queued_len(), 1);
}

#[tokio::test]
async fn mark_completed_promotes_next_queued_job() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let second = store.create("second").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let queue = JobQueue::new(store.clone(), runner.clone(), "http://callback");

    queue.enqueue(first.job_id.clone());
    settle().await;
    queue.enqueue(second.job_id.clone());

    queue.mark_completed(&first.job_id);
    settle().await;

    assert_eq!(queue.current_job_id(), Some(second.job_id.clone()));
    assert_eq!(queue.queued_len(), 0);
    let reloaded = store.load(&second.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Running);
}

#[tokio::test]
async fn mark_completed_for_non_current_job_is_a_no_op() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let other = store.create("other").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let queue = JobQueue::new(store.clone(), runner, "http://callback");

    queue.enqueue(first.job_id.clone());
    settle().await;
    queue.mark_completed(&other.job_id);

    assert_eq!(queue.current_job_id(), Some(first.job_id));
}

#[tokio::test]
async fn cancel_queued_job_marks_it_cancelled_without_touching_current() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let second = store.create("second").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let callback = Arc::new(RecordingLifecycleCallback::new());
    let queue = JobQueue::with_callback(store.clone(), runner.clone(), "http://callback", callback.clone());

    queue.enqueue(first.job_id.clone());
    settle().await;
    queue.enqueue(second.job_id.clone());

    let cancelled = queue.cancel(&second.job_id).await.expect("cancel");
    settle().await;

    assert!(cancelled);
    let reloaded = store.load(&second.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Cancelled);
    assert!(callback.calls().contains(&LifecycleCall::Cancelled(second.job_id.to_string())));
    assert_eq!(queue.current_job_id(), Some(first.job_id));
    assert_eq!(queue.queued_len(), 0);
}

#[tokio::test]
async fn cancel_current_job_requests_runner_cancel_and_promotes_next() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let second = store.create("second").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let callback = Arc::new(RecordingLifecycleCallback::new());
    let queue = JobQueue::with_callback(store.clone(), runner.clone(), "http://callback", callback.clone());

    queue.enqueue(first.job_id.clone());
    settle().await;
    queue.enqueue(second.job_id.clone());

    let cancelled = queue.cancel(&first.job_id).await.expect("cancel");
    settle().await;

    assert!(cancelled);
    let reloaded = store.load(&first.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Cancelled);
    assert!(callback.calls().contains(&LifecycleCall::Cancelled(first.job_id.to_string())));
    assert_eq!(
        runner.calls(),
        vec![
            RunnerCall::Start { job_id: first.job_id.to_string(), goal: first.goal.clone() },
            RunnerCall::Cancel { job_id: first.job_id.to_string() },
            RunnerCall::Start { job_id: second.job_id.to_string(), goal: second.goal.clone() },
        ]
    );
    assert_eq!(queue.current_job_id(), Some(second.job_id));
}

#[tokio::test]
async fn cancel_unknown_job_returns_false() {
    let (_dir, store) = new_store();
    let unrelated = store.create("x").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let queue = JobQueue::new(store, runner, "http://callback");

    assert!(!queue.cancel(&unrelated.job_id).await.expect("cancel"));
}

#[tokio::test]
async fn end_session_marks_done_and_promotes_next() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let second = store.create("second").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    let callback = Arc::new(RecordingLifecycleCallback::new());
    let queue = JobQueue::with_callback(store.clone(), runner.clone(), "http://callback", callback.clone());

    queue.enqueue(first.job_id.clone());
    settle().await;
    queue.enqueue(second.job_id.clone());

    queue.end_session(&first.job_id).await.expect("end_session");
    settle().await;

    let reloaded = store.load(&first.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Done);
    assert!(callback.calls().contains(&LifecycleCall::Done(first.job_id.to_string())));
    assert_eq!(queue.current_job_id(), Some(second.job_id));
}

#[tokio::test]
async fn failed_start_marks_job_failed_and_promotes_next() {
    let (_dir, store) = new_store();
    let first = store.create("first").expect("create");
    let second = store.create("second").expect("create");
    let runner = Arc::new(FakeRunnerClient::new());
    runner.set_fail_start(true);
    let callback = Arc::new(RecordingLifecycleCallback::new());
    let queue = JobQueue::with_callback(store.clone(), runner.clone(), "http://callback", callback.clone());

    queue.enqueue(first.job_id.clone());
    settle().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    settle().await;
    *runner.fail_start.lock() = false;
    queue.enqueue(second.job_id.clone());
    settle().await;

    let reloaded = store.load(&first.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Failed);
    assert!(reloaded.error.is_some());
    assert!(callback.calls().contains(&LifecycleCall::Failed(first.job_id.to_string())));
}

#[parameterized(
    running = { Phase::Running },
    waiting_approval = { Phase::WaitingApproval },
    waiting_input = { Phase::WaitingInput },
)]
fn recover_crashed_jobs_demotes_unrecoverable_phases(phase: Phase) {
    let (_dir, store) = new_store();
    let mut job = store.create("in flight").expect("create");
    job.phase = phase;
    store.save(&job).expect("save");

    let recovered = recover_crashed_jobs(&store).expect("recover");

    assert_eq!(recovered, vec![job.job_id.clone()]);
    let reloaded = store.load(&job.job_id).expect("load");
    assert_eq!(reloaded.phase, Phase::Failed);
    assert!(reloaded.error.is_some());
}

#[test]
fn recover_crashed_jobs_leaves_terminal_and_queued_jobs_alone() {
    let (_dir, store) = new_store();
    let queued = store.create("fresh").expect("create");
    let mut done = store.create("finished").expect("create");
    done.phase = Phase::Done;
    store.save(&done).expect("save");

    let recovered = recover_crashed_jobs(&store).expect("recover");

    assert!(recovered.is_empty());
    assert_eq!(store.load(&queued.job_id).expect("load").phase, Phase::Queued);
    assert_eq!(store.load(&done.job_id).expect("load").phase, Phase::Done);
}
