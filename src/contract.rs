// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! Parses contract files into targets and spoilers, each backed by a
//! [`FiniteAutomaton`], and renders the human-readable contract dump.

use crate::error::AnacondaError;
use crate::fa::FiniteAutomaton;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Dense, globally unique identifier for a target. Target and spoiler IDs
/// are drawn from separate counters, so a target and a spoiler may share
/// the same numeric value without being the same thing.
pub type TargetId = usize;
/// Dense, globally unique identifier for a spoiler.
pub type SpoilerId = usize;

/// A target: a function-name regex that, matched within a single thread,
/// denotes a region of interest, plus the spoilers that may violate it.
#[derive(Debug)]
pub struct Target {
    pub id: TargetId,
    pub fa: Arc<FiniteAutomaton>,
    pub spoilers: Vec<SpoilerId>,
}

/// A spoiler: a function-name regex whose execution in another thread, if
/// not happens-before ordered with a target instance, constitutes a
/// violation.
#[derive(Debug)]
pub struct Spoiler {
    pub id: SpoilerId,
    pub fa: Arc<FiniteAutomaton>,
    pub target: TargetId,
}

/// A set of targets and spoilers parsed from one or more contract files.
///
/// Targets and spoilers are retained for the program's lifetime once
/// loaded; there is no unloading operation.
#[derive(Debug, Default)]
pub struct Contract {
    targets: Vec<Target>,
    spoilers: Vec<Spoiler>,
    next_target_id: TargetId,
    next_spoiler_id: SpoilerId,
}

impl Contract {
    /// Creates an empty contract with no targets or spoilers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn spoilers(&self) -> &[Spoiler] {
        &self.spoilers
    }

    /// Loads rules from `path`, appending to whatever targets/spoilers are
    /// already in this contract.
    ///
    /// Blank lines and lines starting with `#` are skipped. A line that
    /// does not match the `<regex> <- { <regex>[, <regex>]* }` grammar, or
    /// whose regex fails to parse, is logged and skipped — the rest of the
    /// file still loads. If the file itself cannot be opened, returns
    /// [`AnacondaError::ContractUnreadable`] and the caller falls back to
    /// an empty contract set (§7, `FatalInit`).
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), AnacondaError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| AnacondaError::ContractUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Err(reason) = self.load_rule(line) {
                warn!(line, reason, "skipping malformed contract rule");
            }
        }

        Ok(())
    }

    fn load_rule(&mut self, line: &str) -> Result<(), String> {
        let (target_regex, spoilers_body) = line
            .split_once("<-")
            .ok_or_else(|| "missing '<-'".to_string())?;
        let spoilers_body = spoilers_body
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| "spoilers must be wrapped in '{ }'".to_string())?;

        let target_fa = FiniteAutomaton::construct(target_regex.trim())
            .map_err(|e| format!("target regex: {e}"))?;
        let target_id = self.next_target_id;
        self.next_target_id += 1;

        let mut spoiler_ids = Vec::new();
        for spoiler_regex in spoilers_body.split(',') {
            let spoiler_regex = spoiler_regex.trim();
            if spoiler_regex.is_empty() {
                return Err("empty spoiler in list".to_string());
            }
            let spoiler_fa = FiniteAutomaton::construct(spoiler_regex)
                .map_err(|e| format!("spoiler regex: {e}"))?;
            let spoiler_id = self.next_spoiler_id;
            self.next_spoiler_id += 1;

            self.spoilers.push(Spoiler {
                id: spoiler_id,
                fa: Arc::new(spoiler_fa),
                target: target_id,
            });
            spoiler_ids.push(spoiler_id);
        }

        self.targets.push(Target {
            id: target_id,
            fa: Arc::new(target_fa),
            spoilers: spoiler_ids,
        });

        Ok(())
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for target in &self.targets {
            writeln!(f, "Target {}", target.id)?;
            write!(f, "{}", target.fa)?;

            for &spoiler_id in &target.spoilers {
                let spoiler = &self.spoilers[spoiler_id];
                writeln!(f, "  Spoiler {}", spoiler.id)?;
                write!(f, "{}", spoiler.fa)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn contract_from_str(body: &str) -> Contract {
        let file = tempfile_with(body);
        let mut contract = Contract::new();
        contract.load(file.path()).unwrap();
        contract
    }

    struct NamedTemp {
        path: std::path::PathBuf,
    }
    impl NamedTemp {
        fn path(&self) -> &Path {
            &self.path
        }
    }
    impl Drop for NamedTemp {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_with(body: &str) -> NamedTemp {
        let path = std::env::temp_dir().join(format!(
            "anaconda-core-test-{}-{}.contract",
            std::process::id(),
            body.len()
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        NamedTemp { path }
    }

    #[test]
    fn parses_single_target_single_spoiler() {
        let contract = contract_from_str("a <- { b }\n");
        assert_eq!(contract.targets().len(), 1);
        assert_eq!(contract.spoilers().len(), 1);
        assert_eq!(contract.targets()[0].spoilers, vec![0]);
        assert_eq!(contract.spoilers()[0].target, 0);
    }

    #[test]
    fn skips_blank_and_commented_lines() {
        let contract = contract_from_str("# a comment\n\n a <- { b }\n");
        assert_eq!(contract.targets().len(), 1);
    }

    #[test]
    fn multiple_spoilers_share_a_target() {
        let contract = contract_from_str("a <- { b, c }\n");
        assert_eq!(contract.targets()[0].spoilers, vec![0, 1]);
    }

    #[test]
    fn malformed_line_is_skipped_rest_still_loads() {
        let contract = contract_from_str("not a rule\na <- { b }\n");
        assert_eq!(contract.targets().len(), 1);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let mut contract = Contract::new();
        let err = contract.load("/nonexistent/path/contract.txt").unwrap_err();
        assert!(matches!(err, AnacondaError::ContractUnreadable { .. }));
    }

    #[test]
    fn dump_lists_targets_and_their_spoilers() {
        let contract = contract_from_str("a <- { b }\n");
        let dump = contract.to_string();
        assert!(dump.contains("Target 0"));
        assert!(dump.contains("Spoiler 0"));
    }
}
