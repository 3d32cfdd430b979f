// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure text parsing and rendering for the `!poc` chat command surface,
//! ported from `slack_bot.py`'s `parse_command`/`_parse_model_flag`/
//! `format_job_status`. Kept free of any queue/store access so it's
//! trivially unit-testable and so [`crate::chat::PocChatFrontend`] is the
//! only place that touches live state.

use oj_storage::Job;

pub const COMMAND_PREFIX: &str = "!poc";

pub const HELP_TEXT: &str = "\
*POC Agent Commands*

`!poc run [--model opus|sonnet|haiku] <task>` — Start the agent with a task
`!poc status [job_id]` — Show agent status
`!poc cancel [job_id]` — Cancel a running agent
`!poc list` — List recent jobs
`!poc help` — Show this help message

The agent will request approval for bash commands and file writes.
Reply \"yes\"/\"approve\" or \"no\"/\"deny\" in the thread, or use the buttons.
";

/// Splits a `!poc ...` message into `(action, rest)`. An empty or
/// non-`!poc` message parses as `("", "")`; `!poc` alone parses as
/// `("help", "")`.
pub fn parse_command(text: &str) -> (String, String) {
    let text = text.trim();
    if !text.to_lowercase().starts_with(COMMAND_PREFIX) {
        return (String::new(), String::new());
    }

    let rest = text[COMMAND_PREFIX.len()..].trim();
    if rest.is_empty() {
        return ("help".to_string(), String::new());
    }

    match rest.split_once(char::is_whitespace) {
        Some((action, args)) => (action.to_lowercase(), args.trim().to_string()),
        None => (rest.to_lowercase(), String::new()),
    }
}

/// Extracts a leading `--model <alias|id>` flag from `run`'s argument text.
/// Returns `(model, remaining_args)`; `model` is `None` when no flag is
/// present, leaving the caller free to fall back to the store's default.
pub fn parse_model_flag(args: &str) -> (Option<String>, String) {
    let Some(rest) = args.strip_prefix("--model") else {
        return (None, args.to_string());
    };
    let rest = rest.trim_start();
    match rest.split_once(char::is_whitespace) {
        Some((key, remaining)) => (Some(resolve_model_alias(key)), remaining.trim().to_string()),
        None if !rest.is_empty() => (Some(resolve_model_alias(rest)), String::new()),
        None => (None, args.to_string()),
    }
}

fn resolve_model_alias(key: &str) -> String {
    match key.to_lowercase().as_str() {
        "opus" => "claude-opus-4-20250514".to_string(),
        "sonnet" => "claude-sonnet-4-5-20250929".to_string(),
        "haiku" => "claude-haiku-4-5-20251001".to_string(),
        other => other.to_string(),
    }
}

fn phase_emoji(phase: &str) -> &'static str {
    match phase {
        "QUEUED" => ":hourglass:",
        "RUNNING" => ":gear:",
        "WAITING_APPROVAL" => ":lock:",
        "WAITING_INPUT" => ":pencil:",
        "DONE" => ":white_check_mark:",
        "FAILED" => ":x:",
        "CANCELLED" => ":stop_sign:",
        "BLOCKED" => ":warning:",
        _ => ":question:",
    }
}

/// Renders a job into the same multi-line chat message `format_job_status`
/// built: phase/goal/model/iteration always shown, tokens/approved
/// tools/error only when there's something to say.
pub fn format_job_status(job: &Job) -> String {
    let phase = job.phase.to_string();
    let mut lines = vec![
        format!("{} *Job {}* — {}", phase_emoji(&phase), job.job_id, phase),
        format!("Goal: _{}_", job.goal),
        format!("Model: `{}`", job.model),
        format!("Iteration: {}/{}", job.agent_iteration, job.max_turns),
    ];

    if job.input_tokens > 0 || job.output_tokens > 0 {
        lines.push(format!("Tokens: {} in / {} out", job.input_tokens, job.output_tokens));
    }
    if !job.approved_tools.is_empty() {
        lines.push(format!("Approved tools: {}", job.approved_tools.iter().cloned().collect::<Vec<_>>().join(", ")));
    }
    if let Some(error) = &job.error {
        lines.push(format!("\n:rotating_light: Error: {error}"));
    }

    lines.join("\n")
}

/// One line of `!poc list`'s output: `` `job_id` — PHASE — _goal (truncated)_ ``.
pub fn format_job_list_entry(job: &Job) -> String {
    let goal: String = job.goal.chars().take(60).collect();
    format!("  `{}` — {} — _{}_", job.job_id, job.phase, goal)
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
