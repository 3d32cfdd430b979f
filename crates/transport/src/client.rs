// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A minimal HTTP/1.1 client: connect, send one request, read one framed
//! response, close. No keep-alive, no redirects, no chunked encoding —
//! the controller and runner only ever exchange small JSON bodies with
//! each other, the same posture as the teacher's `coop/http.rs` client.

use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::error::TransportError;
use crate::message::{self, Method, Response};

/// Whole-operation timeout (connect + write + read), matching the
/// teacher's 5-second budget for its Unix-socket coop client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn get(addr: &str, path: &str) -> Result<Response, TransportError> {
    timed_request(addr, Method::Get, path, "").await
}

pub async fn post(addr: &str, path: &str, body: &str) -> Result<Response, TransportError> {
    timed_request(addr, Method::Post, path, body).await
}

async fn timed_request(
    addr: &str,
    method: Method,
    path: &str,
    body: &str,
) -> Result<Response, TransportError> {
    tokio::time::timeout(REQUEST_TIMEOUT, send_request(addr, method, path, body))
        .await
        .map_err(|_| TransportError::Timeout)?
}

async fn send_request(
    addr: &str,
    method: Method,
    path: &str,
    body: &str,
) -> Result<Response, TransportError> {
    let mut stream = TcpStream::connect(addr).await.map_err(TransportError::Connect)?;
    let request = message::encode_request(method, path, body);
    message::write_bytes(&mut stream, &request).await?;

    let mut reader = BufReader::new(stream);
    message::read_response(&mut reader).await
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
