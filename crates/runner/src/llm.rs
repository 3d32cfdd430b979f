// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The LLM driver abstraction a session runs one conversation turn through.
//!
//! Not named by spec.md directly — added so the session supervisor is
//! compilable and testable without a real provider wired in, shaped like the
//! teacher's `AgentAdapter` trait (`crates/daemon/src/adapters/agent/mod.rs`):
//! one async entry point, a streamed sequence of typed events, and a
//! `FakeLlmClient` test double (`crates/daemon/src/adapters/agent/fake.rs`'s
//! pattern) that scripts a canned sequence of turns for the supervisor's own
//! tests.

use async_trait::async_trait;
use parking_lot::Mutex;

/// One call into the LLM: the assistant turn to submit plus enough context
/// for the driver to continue an existing conversation.
#[derive(Debug, Clone)]
pub struct LlmTurnInput {
    pub model: String,
    /// The goal on the first turn, a follow-up message on every later one.
    pub message: String,
    pub system_prompt: String,
}

/// One event out of a streamed turn. The supervisor maps these 1:1 onto
/// wire events, mirroring `event_bridge.py`'s `map_assistant_message`/
/// `map_result_message`.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Assistant text chunk within the current turn.
    Text(String),
    /// Extended-thinking chunk within the current turn.
    Thinking(String),
    /// A tool invocation the assistant wants to make.
    ToolUse { tool_use_id: String, tool_name: String, tool_input: String },
    /// The result of a tool call already executed by the driver.
    ToolResult { tool_use_id: String, tool_name: String, result_preview: String },
    /// End-of-turn. `is_error` distinguishes a business failure (spec.md §7)
    /// from a normal turn boundary.
    Result { message: String, num_turns: u32, duration_ms: u64, total_cost_usd: Option<f64>, is_error: bool },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmClientError {
    #[error("LLM provider unreachable: {0}")]
    Unreachable(String),
    #[error("LLM provider rejected request: {0}")]
    Rejected(String),
}

pub type LlmTurnStream = Vec<LlmEvent>;

/// Driver for one LLM conversation. A single implementor instance lives for
/// the lifetime of one session; `run_turn` is called once per submitted
/// message (the initial goal, then once per follow-up).
#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    async fn run_turn(&mut self, input: LlmTurnInput) -> Result<LlmTurnStream, LlmClientError>;
}

/// Scriptable [`LlmClient`] test double: each `run_turn` call pops the next
/// queued stream. Calling past the end of the script is a test bug, not a
/// runtime condition, so it returns [`LlmClientError::Rejected`] rather than
/// panicking.
#[derive(Default)]
pub struct FakeLlmClient {
    turns: Mutex<Vec<LlmTurnStream>>,
    inputs: Mutex<Vec<LlmTurnInput>>,
}

impl FakeLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one turn's worth of events, returned by the next `run_turn` call.
    pub fn push_turn(&self, events: Vec<LlmEvent>) {
        self.turns.lock().push(events);
    }

    /// Every `LlmTurnInput` passed to `run_turn` so far, in order.
    pub fn inputs(&self) -> Vec<LlmTurnInput> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn run_turn(&mut self, input: LlmTurnInput) -> Result<LlmTurnStream, LlmClientError> {
        self.inputs.lock().push(input);
        let mut turns = self.turns.lock();
        if turns.is_empty() {
            return Err(LlmClientError::Rejected("FakeLlmClient: no more scripted turns".into()));
        }
        Ok(turns.remove(0))
    }
}
