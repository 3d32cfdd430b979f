// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the `oj` binary: prerequisite failures (exit code 1,
//! one line per failure, per spec.md §6) and the chat command surface's own
//! business errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("prerequisite checks failed")]
    PrerequisitesFailed(Vec<String>),
    #[error(transparent)]
    Daemon(#[from] oj_daemon::DaemonError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no active job; use `!poc list` to see recent jobs")]
    NoActiveJob,
    #[error("job `{0}` not found")]
    JobNotFound(String),
    #[error("malformed button action value: {0:?}")]
    InvalidButtonValue(String),
    #[error(transparent)]
    Store(#[from] oj_storage::StoreError),
    #[error(transparent)]
    Broker(#[from] oj_engine::BrokerError),
    #[error(transparent)]
    Queue(#[from] oj_engine::QueueError),
    #[error(transparent)]
    Runner(#[from] oj_engine::RunnerClientError),
}
