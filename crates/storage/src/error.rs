// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-state store errors. All but I/O failures are expected, recoverable
//! conditions the caller branches on; I/O failures are fatal and bubble up
//! (spec.md §4.1).

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("corrupt job state for {job_id}: {source}")]
    Corrupt {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
