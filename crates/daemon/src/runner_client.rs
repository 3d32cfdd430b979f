// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`oj_engine::RunnerClient`] over `oj_transport`'s HTTP client — the
//! controller's real implementation of the five job-control calls, backing
//! the [`FakeRunnerClient`] test double `oj-engine` ships for unit tests.
//!
//! Grounded in the teacher's `AgentAdapter` HTTP implementation
//! (`crates/daemon/src/adapters/agent/coop/http.rs`): one small helper per
//! verb, errors from the transport layer and from a non-2xx response both
//! collapse into the trait's own error enum so the queue and broker never
//! see `oj_transport::TransportError` directly.

use async_trait::async_trait;
use oj_core::JobId;
use oj_engine::{RunnerClient, RunnerClientError};
use oj_wire::{ApproveRequest, ApproveResponse, ErrorBody, MessageResponse, StartRequest, StartResponse};

/// Talks to one runner process reachable at a fixed `host:port`.
pub struct HttpRunnerClient {
    addr: String,
}

impl HttpRunnerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl RunnerClient for HttpRunnerClient {
    async fn start(&self, job_id: &JobId, request: StartRequest) -> Result<StartResponse, RunnerClientError> {
        let body = serde_json::to_string(&request).map_err(|e| RunnerClientError::Rejected(e.to_string()))?;
        let path = format!("/jobs/{job_id}/start");
        decode(post(&self.addr, &path, &body).await?)
    }

    async fn approve(&self, job_id: &JobId, request: ApproveRequest) -> Result<ApproveResponse, RunnerClientError> {
        let body = serde_json::to_string(&request).map_err(|e| RunnerClientError::Rejected(e.to_string()))?;
        let path = format!("/jobs/{job_id}/approve");
        decode(post(&self.addr, &path, &body).await?)
    }

    async fn send_message(&self, job_id: &JobId, message: &str) -> Result<MessageResponse, RunnerClientError> {
        let body =
            serde_json::to_string(&oj_wire::MessageRequest { message: message.to_string() })
                .map_err(|e| RunnerClientError::Rejected(e.to_string()))?;
        let path = format!("/jobs/{job_id}/message");
        decode(post(&self.addr, &path, &body).await?)
    }

    async fn cancel(&self, job_id: &JobId) -> Result<(), RunnerClientError> {
        let path = format!("/jobs/{job_id}/cancel");
        decode::<MessageResponse>(post(&self.addr, &path, "{}").await?).map(|_| ())
    }

    async fn end(&self, job_id: &JobId) -> Result<(), RunnerClientError> {
        let path = format!("/jobs/{job_id}/end");
        decode::<MessageResponse>(post(&self.addr, &path, "{}").await?).map(|_| ())
    }
}

async fn post(addr: &str, path: &str, body: &str) -> Result<oj_transport::Response, RunnerClientError> {
    oj_transport::post(addr, path, body).await.map_err(|e| RunnerClientError::Unreachable(e.to_string()))
}

/// Parse a successful response body, or surface a 4xx/5xx response's
/// `{error}` body as [`RunnerClientError::Rejected`].
fn decode<T: serde::de::DeserializeOwned>(response: oj_transport::Response) -> Result<T, RunnerClientError> {
    if !(200..300).contains(&response.status) {
        let message = serde_json::from_str::<ErrorBody>(&response.body)
            .map(|b| b.error)
            .unwrap_or_else(|_| format!("runner returned HTTP {}", response.status));
        return Err(RunnerClientError::Rejected(message));
    }
    serde_json::from_str(&response.body).map_err(|e| RunnerClientError::Rejected(format!("malformed runner response: {e}")))
}

#[cfg(test)]
#[path = "runner_client_tests.rs"]
mod tests;
