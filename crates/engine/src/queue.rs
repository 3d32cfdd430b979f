// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO single-concurrency job scheduler.
//!
//! Verbatim-grounded in `jobs.py`'s `JobQueue`: a `deque` of queued ids, at
//! most one `current_job_id`, a lock guarding both, and a `_start_next`/
//! `_dispatch_start` split so the outbound `start` RPC runs off a detached
//! worker rather than under the lock. `recover_stale_jobs` is ported as the
//! free function [`recover_crashed_jobs`], called once at controller startup
//! before any `JobQueue` exists.

use std::collections::VecDeque;
use std::sync::Arc;

use oj_core::{Clock, JobId, Phase, SystemClock};
use oj_storage::{Job, JobStore};
use oj_wire::StartRequest;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::callback::{LifecycleCallback, NullLifecycleCallback};
use crate::error::QueueError;
use crate::runner_client::RunnerClient;

struct QueueState {
    queued: VecDeque<JobId>,
    current: Option<JobId>,
}

struct Inner<C: Clock> {
    store: JobStore<C>,
    runner: Arc<dyn RunnerClient>,
    callback: Arc<dyn LifecycleCallback>,
    callback_url: String,
    state: Mutex<QueueState>,
}

/// The controller's single-concurrency FIFO job scheduler.
///
/// Cheap to clone: internally an `Arc`, so the same queue handle can be
/// shared with the event-listener task and the broker.
pub struct JobQueue<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for JobQueue<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> JobQueue<C> {
    pub fn new(store: JobStore<C>, runner: Arc<dyn RunnerClient>, callback_url: impl Into<String>) -> Self {
        Self::with_callback(store, runner, callback_url, Arc::new(NullLifecycleCallback))
    }

    pub fn with_callback(
        store: JobStore<C>,
        runner: Arc<dyn RunnerClient>,
        callback_url: impl Into<String>,
        callback: Arc<dyn LifecycleCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                runner,
                callback,
                callback_url: callback_url.into(),
                state: Mutex::new(QueueState { queued: VecDeque::new(), current: None }),
            }),
        }
    }

    pub fn store(&self) -> &JobStore<C> {
        &self.inner.store
    }

    pub fn current_job_id(&self) -> Option<JobId> {
        self.inner.state.lock().current.clone()
    }

    pub fn has_active_session(&self) -> bool {
        self.inner.state.lock().current.is_some()
    }

    pub fn queued_len(&self) -> usize {
        self.inner.state.lock().queued.len()
    }

    /// Append `job_id` to the queue. Returns its 0-based position.
    ///
    /// If no job is currently running, promotes it immediately — but the
    /// `start` RPC itself runs on a detached task so this call never blocks
    /// on network I/O (spec.md §4.4).
    pub fn enqueue(&self, job_id: JobId) -> usize
    where
        C: Clock,
    {
        let mut state = self.inner.state.lock();
        state.queued.push_back(job_id);
        let position = state.queued.len() - 1;
        if state.current.is_none() {
            self.promote_next_locked(&mut state);
        }
        position
    }

    /// Cancel a queued or running job. Returns whether any action was taken.
    pub async fn cancel(&self, job_id: &JobId) -> Result<bool, QueueError> {
        enum Action {
            NotFound,
            WasQueued,
            WasCurrent,
        }

        let action = {
            let mut state = self.inner.state.lock();
            if let Some(pos) = state.queued.iter().position(|q| q == job_id) {
                state.queued.remove(pos);
                Action::WasQueued
            } else if state.current.as_ref() == Some(job_id) {
                state.current = None;
                Action::WasCurrent
            } else {
                Action::NotFound
            }
        };

        match action {
            Action::NotFound => Ok(false),
            Action::WasQueued => {
                self.finish_as(job_id, Phase::Cancelled, None)?;
                let job = self.inner.store.load(job_id)?;
                self.inner.callback.on_job_cancelled(&job);
                Ok(true)
            }
            Action::WasCurrent => {
                // Best-effort: cancellation is cooperative (spec.md §5) and
                // proceeds locally even if the runner is unreachable.
                if let Err(e) = self.inner.runner.cancel(job_id).await {
                    warn!(%job_id, error = %e, "cancel RPC to runner failed; cancelling locally anyway");
                }
                self.finish_as(job_id, Phase::Cancelled, None)?;
                let job = self.inner.store.load(job_id)?;
                self.inner.callback.on_job_cancelled(&job);
                self.promote_next();
                Ok(true)
            }
        }
    }

    /// Called by the event handler when a terminal event (`completed`,
    /// `failed`, `session_ended`) arrives for the current job.
    pub fn mark_completed(&self, job_id: &JobId) {
        let mut state = self.inner.state.lock();
        if state.current.as_ref() == Some(job_id) {
            state.current = None;
            self.promote_next_locked(&mut state);
        }
    }

    /// Graceful persistent-session termination.
    pub async fn end_session(&self, job_id: &JobId) -> Result<(), QueueError> {
        if let Err(e) = self.inner.runner.end(job_id).await {
            warn!(%job_id, error = %e, "end RPC to runner failed; ending locally anyway");
        }
        self.finish_as(job_id, Phase::Done, None)?;
        let job = self.inner.store.load(job_id)?;
        self.inner.callback.on_job_done(&job);

        let mut state = self.inner.state.lock();
        if state.current.as_ref() == Some(job_id) {
            state.current = None;
        }
        self.promote_next_locked(&mut state);
        Ok(())
    }

    fn promote_next(&self) {
        let mut state = self.inner.state.lock();
        self.promote_next_locked(&mut state);
    }

    /// Pop the next queued job and spawn its dispatch as a detached task.
    /// Must be called with `state` already locked; the lock is dropped
    /// before the network I/O in [`dispatch_start`] ever runs.
    fn promote_next_locked(&self, state: &mut QueueState) {
        let Some(job_id) = state.queued.pop_front() else {
            state.current = None;
            return;
        };
        state.current = Some(job_id.clone());
        let inner = Arc::clone(&self.inner);
        tokio::spawn(dispatch_start(inner, job_id));
    }

    fn finish_as(&self, job_id: &JobId, phase: Phase, error: Option<String>) -> Result<(), QueueError>
    where
        C: Clock,
    {
        let mut job = self.inner.store.load(job_id)?;
        job.phase = phase;
        if error.is_some() {
            job.error = error;
        }
        self.inner.store.save(&job)?;
        Ok(())
    }
}

/// Load the job, set it RUNNING, and POST `/start` to the runner. Runs as a
/// detached task so `enqueue`'s caller never blocks on this I/O.
async fn dispatch_start<C: Clock>(inner: Arc<Inner<C>>, job_id: JobId) {
    let mut job = match inner.store.load(&job_id) {
        Ok(job) => job,
        Err(e) => {
            error!(%job_id, error = %e, "failed to load job for start dispatch");
            return;
        }
    };
    job.phase = Phase::Running;
    if let Err(e) = inner.store.save(&job) {
        error!(%job_id, error = %e, "failed to persist RUNNING phase");
        return;
    }

    let request = StartRequest {
        goal: job.goal.clone(),
        callback_url: if job.callback_url.is_empty() { inner.callback_url.clone() } else { job.callback_url.clone() },
        model: Some(job.model.clone()),
        max_turns: Some(job.max_turns),
        approval_timeout: job.approval_timeout_s,
    };

    match inner.runner.start(&job_id, request).await {
        Ok(_) => {
            inner.callback.on_job_started(&job);
        }
        Err(e) => {
            error!(%job_id, error = %e, "failed to start agent on runner");
            job.phase = Phase::Failed;
            job.error = Some(format!("Failed to start agent: {e}"));
            if let Err(save_err) = inner.store.save(&job) {
                error!(%job_id, error = %save_err, "failed to persist FAILED phase after start error");
            }
            inner.callback.on_job_failed(&job);
            let mut state = inner.state.lock();
            if state.current.as_ref() == Some(&job_id) {
                state.current = None;
                let Some(next_id) = state.queued.pop_front() else {
                    return;
                };
                state.current = Some(next_id.clone());
                drop(state);
                tokio::spawn(dispatch_start(inner, next_id));
            }
        }
    }
}

/// On controller startup, demote any job whose phase is RUNNING,
/// WAITING_APPROVAL, or WAITING_INPUT to FAILED: the runner-side `Session`
/// that would resume it is gone (spec.md §4.4).
pub fn recover_crashed_jobs<C: Clock>(store: &JobStore<C>) -> Result<Vec<JobId>, QueueError> {
    const RECOVERY_ERROR: &str = "Orchestrator restarted while job was running";
    let mut recovered = Vec::new();
    for job_id in store.list()? {
        let mut job: Job = store.load(&job_id)?;
        if job.phase.is_unrecoverable() {
            warn!(%job_id, phase = %job.phase, "recovering stale job -> FAILED");
            job.phase = Phase::Failed;
            job.error = Some(RECOVERY_ERROR.to_string());
            store.save(&job)?;
            recovered.push(job_id);
        }
    }
    if !recovered.is_empty() {
        info!(count = recovered.len(), "recovered stale jobs");
    }
    Ok(recovered)
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
