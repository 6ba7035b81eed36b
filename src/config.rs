// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! Runtime configuration for a [`Dispatcher`](crate::dispatcher::Dispatcher).

use std::path::PathBuf;

/// Configuration loaded once at start-up.
///
/// Log verbosity is not a field here: it is controlled the same way the
/// rest of the `tracing` ecosystem is, through the `RUST_LOG` environment
/// variable read by `tracing_subscriber::EnvFilter`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Contract files to load, in order. All files share the same global
    /// target/spoiler ID counters, so a spoiler in the second file can
    /// still conflict with a target declared in the first.
    pub contract_paths: Vec<PathBuf>,
    /// Where violation reports are appended, as rendered text. `None`
    /// means violations are only logged, not written to a file.
    pub report_path: Option<PathBuf>,
    /// Where violation reports are appended as JSON Lines, for consumers
    /// that want a machine-readable report. `None` disables it.
    pub json_report_path: Option<PathBuf>,
    /// Whether to write a `<path>.dump` of each loaded contract's parsed
    /// automata next to it, for debugging contract files.
    pub dump_contracts: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }
}
