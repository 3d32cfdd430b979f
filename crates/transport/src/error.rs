// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-level failures: everything short of "the peer sent a
//! well-formed response/request I disagree with."

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
    #[error("write failed: {0}")]
    Write(std::io::Error),
    #[error("read failed: {0}")]
    Read(std::io::Error),
    #[error("request timed out")]
    Timeout,
    #[error("malformed HTTP message: {0}")]
    Malformed(String),
}
