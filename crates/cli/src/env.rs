// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prerequisite checks for `oj run`, ported from `main.py`'s
//! `check_prerequisites`: a container runtime on `PATH` plus the two chat
//! credentials, collected into one list so every failure is reported rather
//! than just the first.

/// Required chat-bot token, analogous to `main.py`'s `SLACK_BOT_TOKEN`.
pub const CHAT_BOT_TOKEN_VAR: &str = "OJ_CHAT_BOT_TOKEN";
/// Required chat-app token, analogous to `main.py`'s `SLACK_APP_TOKEN`.
pub const CHAT_APP_TOKEN_VAR: &str = "OJ_CHAT_APP_TOKEN";

/// Returns one message per failed prerequisite; empty when everything's in
/// place.
pub fn check_prerequisites() -> Vec<String> {
    let mut errors = Vec::new();

    if !command_on_path("docker") {
        errors.push("'docker' not found on PATH".to_string());
    }

    if std::env::var(CHAT_BOT_TOKEN_VAR).unwrap_or_default().is_empty() {
        errors.push(format!("{CHAT_BOT_TOKEN_VAR} not set"));
    }
    if std::env::var(CHAT_APP_TOKEN_VAR).unwrap_or_default().is_empty() {
        errors.push(format!("{CHAT_APP_TOKEN_VAR} not set"));
    }

    errors
}

fn command_on_path(name: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).is_file())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
