// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for the concurrency-analysis core.
///
/// None of these are fatal to the monitored program: a contract parse
/// failure skips the offending line, an unreadable contract file falls back
/// to an empty contract set, and everything else is logged and ignored.
#[derive(Debug, Error)]
pub enum AnacondaError {
    #[error("contract file {path:?} could not be read: {source}")]
    ContractUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed contract rule, skipped: {line:?} ({reason})")]
    ContractParse { line: String, reason: String },

    #[error("event for unknown thread {tid}")]
    UnknownThread { tid: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
