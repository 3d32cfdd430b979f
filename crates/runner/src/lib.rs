// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner library: the session supervisor, its LLM/event-sink seams, and the
//! HTTP route table the binary listens on for the controller's job-control
//! calls (`jobs/{id}/start|approve|message|cancel|end|status`, `/health`).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod event_sink;
mod llm;
mod routes;
mod session;

pub use event_sink::{EventSink, HttpEventSink, NullEventSink, RecordingEventSink};
pub use llm::{FakeLlmClient, LlmClient, LlmClientError, LlmEvent, LlmTurnInput, LlmTurnStream};
pub use routes::{make_handler, LlmClientFactory, RunnerState};
pub use session::{
    PendingApproval, Session, SessionConfig, DEFAULT_APPROVAL_REQUIRED_TOOLS,
    DEFAULT_APPROVAL_TIMEOUT_S,
};
