// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request/response shapes shared by the client and server halves of
//! the codec, plus the Content-Length-framed read/write routines grounded
//! in `coop/http.rs`'s `read_http_response`, extended here into a matching
//! `read_request` for the server side the teacher never needed.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A parsed HTTP/1.1 request line, headers (Content-Length only; nothing
/// else in this protocol needs header inspection), and body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: String,
}

/// A response to write back: status line plus body. Always sent as
/// `Content-Type: application/json` since every route in this protocol
/// speaks JSON.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

pub(crate) fn encode_request(method: Method, path: &str, body: &str) -> Vec<u8> {
    match method {
        Method::Get => format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").into_bytes(),
        Method::Post => format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len(),
        )
        .into_bytes(),
    }
}

pub(crate) fn encode_response(response: &Response) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason_phrase(response.status),
        response.body.len(),
        response.body,
    )
    .into_bytes()
}

/// Read `Content-Length: N` case-insensitively; absent or unparsable means
/// no body, mirroring `coop/http.rs`'s `unwrap_or(0)`.
async fn read_headers<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<usize, TransportError> {
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.map_err(TransportError::Read)?;
        if n == 0 || line == "\r\n" {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(val) = lower.strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }
    Ok(content_length)
}

async fn read_body<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    content_length: usize,
) -> Result<String, TransportError> {
    if content_length == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u8; content_length];
    reader.read_exact(&mut buf).await.map_err(TransportError::Read)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse an HTTP/1.1 request (request-line, headers, body) off a buffered
/// stream. Used by the server side of every route in this protocol.
pub async fn read_request<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Request, TransportError> {
    let mut request_line = String::new();
    let n = reader.read_line(&mut request_line).await.map_err(TransportError::Read)?;
    if n == 0 {
        return Err(TransportError::Malformed("connection closed before request line".into()));
    }
    let mut parts = request_line.split_whitespace();
    let method = match parts.next() {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        Some(other) => return Err(TransportError::Malformed(format!("unsupported method {other}"))),
        None => return Err(TransportError::Malformed("empty request line".into())),
    };
    let path = parts
        .next()
        .ok_or_else(|| TransportError::Malformed("missing request target".into()))?
        .to_string();

    let content_length = read_headers(reader).await?;
    let body = read_body(reader, content_length).await?;
    Ok(Request { method, path, body })
}

/// Parse an HTTP/1.1 response (status line, headers, body) off a buffered
/// stream. Mirrors `coop/http.rs`'s `read_http_response`, generalized to
/// keep the status code instead of folding 4xx/5xx into an error string so
/// callers can branch on it the way `docker_exec.py`'s `_post` does.
pub(crate) async fn read_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Response, TransportError> {
    let mut status_line = String::new();
    let n = reader.read_line(&mut status_line).await.map_err(TransportError::Read)?;
    if n == 0 {
        return Err(TransportError::Malformed("connection closed before status line".into()));
    }
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| TransportError::Malformed(format!("bad status line: {status_line:?}")))?;

    let content_length = read_headers(reader).await?;
    let body = read_body(reader, content_length).await?;
    Ok(Response { status, body })
}

pub(crate) async fn write_bytes<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), TransportError> {
    writer.write_all(bytes).await.map_err(TransportError::Write)
}

/// Write a response, framed with Content-Length, onto a stream.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), TransportError> {
    write_bytes(writer, &encode_response(response)).await
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
