// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-specific input summarization, ported verbatim from
//! `event_bridge.py::_summarize_input` in the source this was distilled
//! from. Summaries are lossy, display-only, and never re-parsed.

use serde_json::Value;

/// Summarize a tool invocation's input to a short display string, applying
/// a tool-specific projection and a 200-char cap.
pub fn summarize_tool_input(tool_name: &str, tool_input: &Value) -> String {
    let raw = match tool_name {
        "Bash" => tool_input
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "Read" | "Write" | "Edit" => tool_input
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "Glob" | "Grep" => tool_input
            .get("pattern")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "WebSearch" => tool_input
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "WebFetch" => tool_input
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => serde_json::to_string(tool_input).unwrap_or_default(),
    };
    truncate(&raw, 200)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bash_summarizes_command() {
        let input = json!({"command": "ls -la /sandbox"});
        assert_eq!(summarize_tool_input("Bash", &input), "ls -la /sandbox");
    }

    #[test]
    fn bash_truncates_long_command() {
        let cmd = "x".repeat(250);
        let input = json!({"command": cmd});
        let summary = summarize_tool_input("Bash", &input);
        assert_eq!(summary.len(), 200);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn file_tools_summarize_path() {
        let input = json!({"file_path": "/sandbox/main.rs"});
        assert_eq!(summarize_tool_input("Write", &input), "/sandbox/main.rs");
        assert_eq!(summarize_tool_input("Edit", &input), "/sandbox/main.rs");
        assert_eq!(summarize_tool_input("Read", &input), "/sandbox/main.rs");
    }

    #[test]
    fn search_tools_summarize_pattern() {
        let input = json!({"pattern": "TODO"});
        assert_eq!(summarize_tool_input("Glob", &input), "TODO");
        assert_eq!(summarize_tool_input("Grep", &input), "TODO");
    }

    #[test]
    fn web_tools_summarize_query_and_url() {
        assert_eq!(
            summarize_tool_input("WebSearch", &json!({"query": "rust async"})),
            "rust async"
        );
        assert_eq!(
            summarize_tool_input("WebFetch", &json!({"url": "https://example.com"})),
            "https://example.com"
        );
    }

    #[test]
    fn unknown_tool_dumps_json() {
        let input = json!({"a": 1, "b": "two"});
        let summary = summarize_tool_input("MysteryTool", &input);
        assert!(summary.contains("\"a\":1"));
    }
}
