// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-error taxonomies for the queue and broker (spec.md §7's "State
//! errors": no matching pending approval, session not found, already
//! running). Callers at the RPC boundary map these to 400/404/409.

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error(transparent)]
    Store(#[from] oj_storage::StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("no pending approval for job {0}")]
    NoPendingApproval(String),
    #[error(transparent)]
    Store(#[from] oj_storage::StoreError),
}
