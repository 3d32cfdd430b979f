// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response bodies for the controller→runner job-control routes
//! (spec.md §4.6's first table). `/jobs/{id}/cancel` and `/jobs/{id}/end`
//! take and return bodies with no payload fields beyond `status`, so they
//! reuse [`MessageResponse`]'s shape rather than growing dedicated types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub goal: String,
    pub callback_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub job_id: String,
    pub status: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub tool_use_id: String,
    pub approved: bool,
    #[serde(default)]
    pub auto_approve_tool: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveResponse {
    pub status: String,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApprovalView {
    pub tool_use_id: String,
    pub tool_name: String,
}

/// `GET /jobs/{id}/status` response — a snapshot of runner-side session
/// state, not the persisted `Job` (that lives in `ajo-storage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: String,
    pub iteration: u32,
    pub max_turns: u32,
    pub model: String,
    pub result_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval: Option<PendingApprovalView>,
}

/// A plain `{error}` body, used for 400/404/409 protocol and state errors
/// (spec.md §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
