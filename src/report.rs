// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! Writes violation reports and contract dumps to disk.

use crate::contract::Contract;
use crate::error::AnacondaError;
use crate::window::Violation;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends `violation`'s rendering, followed by a blank line, to the file
/// at `path`. The file is created if it does not exist.
pub fn append_violation(path: impl AsRef<Path>, violation: &Violation) -> Result<(), AnacondaError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .map_err(AnacondaError::Io)?;
    writeln!(file, "{violation}\n").map_err(AnacondaError::Io)
}

/// Appends `violation` as one line of JSON to the file at `path`, for
/// consumers that want a machine-readable report instead of (or in
/// addition to) [`append_violation`]'s rendered text. The file is created
/// if it does not exist.
pub fn append_violation_json(path: impl AsRef<Path>, violation: &Violation) -> Result<(), AnacondaError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .map_err(AnacondaError::Io)?;
    let line = serde_json::to_string(violation).expect("Violation always serializes");
    writeln!(file, "{line}").map_err(AnacondaError::Io)
}

/// Writes `contract`'s parsed automata to `<path>.dump`, in the same
/// format [`Contract`]'s `Display` impl produces.
pub fn dump_contract(path: impl AsRef<Path>, contract: &Contract) -> Result<(), AnacondaError> {
    let mut dump_path = path.as_ref().as_os_str().to_owned();
    dump_path.push(".dump");
    std::fs::write(dump_path, contract.to_string()).map_err(AnacondaError::Io)
}
