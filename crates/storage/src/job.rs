// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted [`Job`] record.

use std::collections::BTreeSet;

use oj_core::{JobId, Phase};
use serde::{Deserialize, Serialize};

/// Default model identifier when a job doesn't specify one, mirroring
/// `agent.py`'s `self.model or "claude-sonnet-4-5-20250929"`.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Safety bound on assistant turns, mirroring `AgentSession.max_turns`.
pub const DEFAULT_MAX_TURNS: u32 = 200;

/// The unit of work tracked by the controller's job-state store.
///
/// All fields round-trip through `state.json`. `#[serde(default)]` on every
/// field added after the initial schema keeps `load` tolerant of older
/// on-disk records (forward-compatibility invariant, spec.md §4.1) —
/// unknown fields present in a *future* schema are silently dropped on
/// `save` rather than preserved, which this store documents as a closed
/// schema (the Open Question in spec.md §4.1 is resolved that way; see
/// DESIGN.md).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub goal: String,
    pub phase: Phase,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub requested_by: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub thread_ts: String,
    #[serde(default)]
    pub original_message_ts: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub approved_tools: BTreeSet<String>,
    #[serde(default)]
    pub agent_iteration: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub callback_url: String,
    /// (ADDED) accumulated from `token_usage` events; dropped from the
    /// distilled spec's Job attribute list but fed by a retained event.
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    /// (ADDED) per-job override of the runner's default 600s approval wait.
    #[serde(default)]
    pub approval_timeout_s: Option<u64>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

impl Job {
    /// Whether `phase` forbids any further transition (spec.md §3 invariant).
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Record a `token_usage` event's accounting onto the job.
    pub fn accumulate_tokens(&mut self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
    }
}
