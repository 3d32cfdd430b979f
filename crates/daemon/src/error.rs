// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller startup and configuration errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to bind controller socket at {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error(transparent)]
    Store(#[from] oj_storage::StoreError),

    #[error(transparent)]
    Queue(#[from] oj_engine::QueueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),
}
