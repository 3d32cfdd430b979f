// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event envelope that flows runner → controller over `POST /events`,
//! and the closed set of event kinds it can carry.
//!
//! The envelope itself (`job_id`, `event_type`, `timestamp`, `data`) is a
//! plain struct rather than a `#[serde(tag = ..., content = ...)]` enum: the
//! `data` object's shape varies by `event_type`, and a garbled or
//! forward-incompatible payload must not prevent the envelope's own fields
//! (needed for routing and logging) from deserializing. `EventKind` round-trips
//! the wire string; `EventData` is matched against it at construction time.

use oj_core::JobId;
use serde::{Deserialize, Serialize};

use crate::timestamp::now_iso8601;

/// The closed set of event types the runner may emit, per the event-delivery
/// protocol. `Unknown` is the forward-compatibility catch-all: a future
/// runner build may emit an event type this controller doesn't know yet, and
/// the envelope must still parse (only the typed payload is dropped).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Thinking,
    ToolCall,
    ToolResult,
    ApprovalNeeded,
    ApprovalTimeout,
    AssistantResponse,
    WaitingInput,
    Completed,
    Failed,
    SessionEnded,
    TokenUsage,
    Unknown(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Progress => "progress",
            EventKind::Thinking => "thinking",
            EventKind::ToolCall => "tool_call",
            EventKind::ToolResult => "tool_result",
            EventKind::ApprovalNeeded => "approval_needed",
            EventKind::ApprovalTimeout => "approval_timeout",
            EventKind::AssistantResponse => "assistant_response",
            EventKind::WaitingInput => "waiting_input",
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
            EventKind::SessionEnded => "session_ended",
            EventKind::TokenUsage => "token_usage",
            EventKind::Unknown(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "progress" => EventKind::Progress,
            "thinking" => EventKind::Thinking,
            "tool_call" => EventKind::ToolCall,
            "tool_result" => EventKind::ToolResult,
            "approval_needed" => EventKind::ApprovalNeeded,
            "approval_timeout" => EventKind::ApprovalTimeout,
            "assistant_response" => EventKind::AssistantResponse,
            "waiting_input" => EventKind::WaitingInput,
            "completed" => EventKind::Completed,
            "failed" => EventKind::Failed,
            "session_ended" => EventKind::SessionEnded,
            "token_usage" => EventKind::TokenUsage,
            other => EventKind::Unknown(other.to_string()),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::from(s.as_str()))
    }
}

/// Status reported in a [`EventData::Completed`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletedStatus {
    Completed,
    Cancelled,
    MaxIterations,
}

/// Typed payload for each [`EventKind`]. Fields mirror the "required data"
/// column of the event-type table exactly.
///
/// Not embedded directly in [`EventEnvelope`]'s wire form: the envelope's
/// `data` field is a raw [`serde_json::Value`] so that a garbled or
/// forward-incompatible payload never prevents the envelope itself (needed
/// for routing and the `events.jsonl` log) from deserializing. Call
/// [`EventEnvelope::parsed_data`] to get a typed `EventData`, matched against
/// `event_type` — a shape mismatch there is reported to the caller to log
/// and drop, not a parse error for the whole envelope.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Progress {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iteration: Option<u32>,
    },
    Thinking {
        iteration: u32,
        thinking: String,
    },
    ToolCall {
        tool_name: String,
        tool_input: String,
        tool_use_id: String,
    },
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        result_preview: String,
    },
    ApprovalNeeded {
        tool_use_id: String,
        tool_name: String,
        tool_input: String,
    },
    ApprovalTimeout {
        tool_use_id: String,
        tool_name: String,
        timeout: u64,
    },
    AssistantResponse {
        message: String,
        num_turns: u32,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
    },
    Completed {
        status: CompletedStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Failed {
        error: String,
    },
    SessionEnded {
        message: String,
    },
    TokenUsage {
        input_tokens: u64,
        output_tokens: u64,
        iteration: u32,
    },
    /// `waiting_input` carries no data; also the catch-all for an
    /// [`EventKind::Unknown`] envelope whose payload this build cannot
    /// interpret — logged and dropped rather than rejected outright.
    Empty {},
}

impl EventData {
    /// The maximum length a tool-input summary or result preview may reach
    /// before truncation, per event type.
    pub const TOOL_INPUT_MAX: usize = 200;
    pub const RESULT_PREVIEW_MAX: usize = 500;
    pub const PROGRESS_MAX: usize = 2000;
}

/// A single runner→controller event, as it travels over `POST /events` and
/// as it is appended to the per-job `events.jsonl` log.
///
/// `data` is kept as a raw JSON value rather than a typed [`EventData`] so
/// that an envelope with an unrecognized `event_type` or a payload shape
/// this build doesn't understand still deserializes — only [`parsed_data`]
/// fails, and callers log and drop rather than rejecting the whole envelope.
///
/// [`parsed_data`]: EventEnvelope::parsed_data
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventEnvelope {
    pub job_id: JobId,
    pub event_type: EventKind,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Construct an envelope stamped with the current UTC time from a typed
    /// payload (always succeeds: `EventData`'s own fields always serialize).
    pub fn new(job_id: JobId, event_type: EventKind, data: EventData) -> Self {
        Self {
            job_id,
            event_type,
            timestamp: now_iso8601(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Attempt to interpret `data` as the typed payload matching
    /// `event_type`. Returns `None` on any shape mismatch — the caller's
    /// policy (per spec.md §9) is to log and drop, not to reject the
    /// envelope's routing fields.
    pub fn parsed_data(&self) -> Option<EventData> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Convenience constructors mirroring the event-type table 1:1, used by the
/// runner's session supervisor and LLM-event mapping layer.
pub enum Event {}

impl Event {
    pub fn progress(job_id: JobId, message: impl Into<String>, iteration: Option<u32>) -> EventEnvelope {
        let message = truncate(message.into(), EventData::PROGRESS_MAX);
        EventEnvelope::new(job_id, EventKind::Progress, EventData::Progress { message, iteration })
    }

    pub fn thinking(job_id: JobId, iteration: u32, thinking: impl Into<String>) -> EventEnvelope {
        let thinking = truncate(thinking.into(), 500);
        EventEnvelope::new(job_id, EventKind::Thinking, EventData::Thinking { iteration, thinking })
    }

    pub fn tool_call(
        job_id: JobId,
        tool_name: impl Into<String>,
        tool_input: impl Into<String>,
        tool_use_id: impl Into<String>,
    ) -> EventEnvelope {
        EventEnvelope::new(
            job_id,
            EventKind::ToolCall,
            EventData::ToolCall {
                tool_name: tool_name.into(),
                tool_input: tool_input.into(),
                tool_use_id: tool_use_id.into(),
            },
        )
    }

    pub fn tool_result(
        job_id: JobId,
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        result_preview: impl Into<String>,
    ) -> EventEnvelope {
        let result_preview = truncate(result_preview.into(), EventData::RESULT_PREVIEW_MAX);
        EventEnvelope::new(
            job_id,
            EventKind::ToolResult,
            EventData::ToolResult {
                tool_use_id: tool_use_id.into(),
                tool_name: tool_name.into(),
                result_preview,
            },
        )
    }

    pub fn approval_needed(
        job_id: JobId,
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_input: impl Into<String>,
    ) -> EventEnvelope {
        EventEnvelope::new(
            job_id,
            EventKind::ApprovalNeeded,
            EventData::ApprovalNeeded {
                tool_use_id: tool_use_id.into(),
                tool_name: tool_name.into(),
                tool_input: tool_input.into(),
            },
        )
    }

    pub fn approval_timeout(
        job_id: JobId,
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        timeout: u64,
    ) -> EventEnvelope {
        EventEnvelope::new(
            job_id,
            EventKind::ApprovalTimeout,
            EventData::ApprovalTimeout {
                tool_use_id: tool_use_id.into(),
                tool_name: tool_name.into(),
                timeout,
            },
        )
    }

    pub fn assistant_response(
        job_id: JobId,
        message: impl Into<String>,
        num_turns: u32,
        duration_ms: u64,
        total_cost_usd: Option<f64>,
    ) -> EventEnvelope {
        let message = truncate(message.into(), 2000);
        EventEnvelope::new(
            job_id,
            EventKind::AssistantResponse,
            EventData::AssistantResponse {
                message,
                num_turns,
                duration_ms,
                total_cost_usd,
            },
        )
    }

    pub fn waiting_input(job_id: JobId) -> EventEnvelope {
        EventEnvelope::new(job_id, EventKind::WaitingInput, EventData::Empty {})
    }

    pub fn completed(job_id: JobId, status: CompletedStatus, message: Option<String>) -> EventEnvelope {
        EventEnvelope::new(job_id, EventKind::Completed, EventData::Completed { status, message })
    }

    pub fn failed(job_id: JobId, error: impl Into<String>) -> EventEnvelope {
        EventEnvelope::new(job_id, EventKind::Failed, EventData::Failed { error: error.into() })
    }

    pub fn session_ended(job_id: JobId, message: impl Into<String>) -> EventEnvelope {
        EventEnvelope::new(
            job_id,
            EventKind::SessionEnded,
            EventData::SessionEnded { message: message.into() },
        )
    }

    pub fn token_usage(job_id: JobId, input_tokens: u64, output_tokens: u64, iteration: u32) -> EventEnvelope {
        EventEnvelope::new(
            job_id,
            EventKind::TokenUsage,
            EventData::TokenUsage { input_tokens, output_tokens, iteration },
        )
    }
}

fn truncate(s: String, max: usize) -> String {
    if s.len() <= max {
        s
    } else {
        s.chars().take(max).collect()
    }
}
