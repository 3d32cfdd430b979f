// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Where a session's wire events go: POSTed to the controller's
//! `callback_url` and always appended to a local `events.jsonl`, regardless
//! of whether the POST succeeded.
//!
//! Grounded verbatim in `callback.py`'s `CallbackClient`: best-effort remote
//! delivery, logged and swallowed on failure (spec.md §7 — "the runner treats
//! callback-unreachable as a log-only degradation"), with the local log
//! write happening unconditionally so nothing is lost if the controller is
//! briefly unreachable. `NullCallbackClient` becomes [`NullEventSink`] here.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use oj_wire::EventEnvelope;
use parking_lot::Mutex;
use tracing::warn;

#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn emit(&self, callback_url: &str, event: &EventEnvelope);
}

/// Posts to `callback_url` and appends to `<events_dir>/<job_id>/events.jsonl`.
pub struct HttpEventSink {
    events_dir: PathBuf,
}

impl HttpEventSink {
    pub fn new(events_dir: impl Into<PathBuf>) -> Self {
        Self { events_dir: events_dir.into() }
    }

    fn append_local(&self, event: &EventEnvelope) {
        let dir = self.events_dir.join(event.job_id.as_str());
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(job_id = %event.job_id, error = %e, "failed to create events directory");
            return;
        }
        let line = match serde_json::to_string(event) {
            Ok(s) => s,
            Err(e) => {
                warn!(job_id = %event.job_id, error = %e, "failed to serialize event for local log");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events.jsonl"))
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!(job_id = %event.job_id, error = %e, "failed to append to local events log");
        }
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn emit(&self, callback_url: &str, event: &EventEnvelope) {
        self.append_local(event);

        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(e) => {
                warn!(job_id = %event.job_id, error = %e, "failed to serialize event for callback POST");
                return;
            }
        };
        let Some((addr, path)) = split_url(callback_url) else {
            warn!(callback_url, "malformed callback_url; skipping remote delivery");
            return;
        };
        if let Err(e) = oj_transport::post(&addr, &path, &body).await {
            warn!(job_id = %event.job_id, event_type = %event.event_type, error = %e, "callback POST failed; event kept in local log only");
        }
    }
}

/// Splits `http://host:port/path` into `("host:port", "/path")` for
/// `oj_transport::post`'s `(addr, path)` signature. No real URL parser is
/// needed: this protocol only ever sees `http://` loopback/container
/// addresses (spec.md §4.6 — "no authentication, trusted local network").
fn split_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("http://")?;
    match rest.find('/') {
        Some(idx) => Some((rest[..idx].to_string(), rest[idx..].to_string())),
        None => Some((rest.to_string(), "/".to_string())),
    }
}

/// Default sink: does nothing (not even the local log). Used in unit tests
/// that don't care about delivery.
#[derive(Debug, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _callback_url: &str, _event: &EventEnvelope) {}
}

/// Records every emitted event instead of sending it anywhere, for session
/// tests asserting on the exact event sequence.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, _callback_url: &str, event: &EventEnvelope) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
#[path = "event_sink_tests.rs"]
mod tests;
