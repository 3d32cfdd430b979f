// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the runner binary.

use std::path::PathBuf;

/// Port the runner's job-control HTTP server listens on.
pub fn port() -> u16 {
    std::env::var("OJ_RUNNER_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8081)
}

/// Directory `<events_dir>/<job_id>/events.jsonl` local event logs are
/// written under. `OJ_STATE_DIR`-relative by default, mirroring the
/// controller's own state-directory resolution.
pub fn events_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OJ_RUNNER_EVENTS_DIR") {
        return PathBuf::from(dir);
    }
    state_dir().join("runner-events")
}

/// Log file path for the runner process.
pub fn log_path() -> PathBuf {
    if let Ok(path) = std::env::var("OJ_RUNNER_LOG_PATH") {
        return PathBuf::from(path);
    }
    state_dir().join("runner.log")
}

/// LLM provider API key. Read here so a future real `LlmClient`
/// implementation has a single place to source credentials from, per
/// spec.md §6 ("the runner reads LLM credentials and an optional base URL").
pub fn llm_api_key() -> Option<String> {
    std::env::var("OJ_LLM_API_KEY").ok().filter(|s| !s.is_empty())
}

pub fn llm_base_url() -> Option<String> {
    std::env::var("OJ_LLM_BASE_URL").ok().filter(|s| !s.is_empty())
}

fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OJ_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("oj");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".local/state/oj")
}
