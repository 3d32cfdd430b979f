// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle notification sink for the job queue.
//!
//! Verbatim-grounded in `jobs.py`'s `AgentCallback` protocol / `NullCallback`:
//! the queue fires one of these on every phase transition it drives, and the
//! chat front-end (out of scope per spec.md §1) implements the trait to
//! render status updates. Shaped like the teacher's own no-op adapter
//! pattern (`NullCallback`/`DesktopNotifyAdapter`'s no-op variants).

use oj_storage::Job;
use parking_lot::Mutex;

pub trait LifecycleCallback: Send + Sync + 'static {
    fn on_job_started(&self, job: &Job);
    fn on_job_done(&self, job: &Job);
    fn on_job_failed(&self, job: &Job);
    fn on_job_cancelled(&self, job: &Job);
}

/// Default sink: does nothing. Used when no front-end is wired in.
#[derive(Debug, Default)]
pub struct NullLifecycleCallback;

impl LifecycleCallback for NullLifecycleCallback {
    fn on_job_started(&self, _job: &Job) {}
    fn on_job_done(&self, _job: &Job) {}
    fn on_job_failed(&self, _job: &Job) {}
    fn on_job_cancelled(&self, _job: &Job) {}
}

/// One recorded callback invocation, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCall {
    Started(String),
    Done(String),
    Failed(String),
    Cancelled(String),
}

/// Records every call instead of acting on it, for queue tests that assert
/// which transitions fired and in what order.
#[derive(Default)]
pub struct RecordingLifecycleCallback {
    calls: Mutex<Vec<LifecycleCall>>,
}

impl RecordingLifecycleCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<LifecycleCall> {
        self.calls.lock().clone()
    }
}

impl LifecycleCallback for RecordingLifecycleCallback {
    fn on_job_started(&self, job: &Job) {
        self.calls.lock().push(LifecycleCall::Started(job.job_id.to_string()));
    }

    fn on_job_done(&self, job: &Job) {
        self.calls.lock().push(LifecycleCall::Done(job.job_id.to_string()));
    }

    fn on_job_failed(&self, job: &Job) {
        self.calls.lock().push(LifecycleCall::Failed(job.job_id.to_string()));
    }

    fn on_job_cancelled(&self, job: &Job) {
        self.calls.lock().push(LifecycleCall::Cancelled(job.job_id.to_string()));
    }
}
