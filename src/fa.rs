// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! Epsilon-NFA construction from a restricted regex over function names, and
//! a runner that drives a single-instance match through the resulting
//! epsilon-free finite automaton.

use crate::error::AnacondaError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

const EPSILON: &str = "";

/// A single state of a [`FiniteAutomaton`]: an arena index plus a map from
/// symbol to the index of the state it transitions to.
#[derive(Debug, Clone, Default)]
struct FaState {
    transitions: HashMap<String, usize>,
    accepting: bool,
}

/// An epsilon-free finite automaton over an alphabet of function names.
///
/// States are held in an arena (`Vec<FaState>`) and referenced by index
/// rather than by pointer, so the automaton can be cloned, sent across
/// threads (wrapped in an `Arc`), and iterated without unsafe code.
///
/// Construction guarantees: no state has an epsilon (empty-label)
/// transition, and every state is reachable from `start`.
#[derive(Debug, Clone)]
pub struct FiniteAutomaton {
    states: Vec<FaState>,
    start: usize,
    /// The original regex, kept for reporting.
    regex: String,
    alphabet: HashSet<String>,
}

/// The outcome of advancing a [`FaRunner`] by one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceResult {
    /// The symbol belongs to the alphabet and a transition was taken.
    MovedToNextState,
    /// The symbol belongs to the alphabet but the current state has no
    /// transition for it.
    NoTransitionFound,
    /// The symbol does not belong to the automaton's alphabet at all.
    InvalidSymbol,
}

enum Token {
    Symbol(String),
    LParen,
    RParen,
    Pipe,
}

fn tokenize(regex: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();

    macro_rules! flush {
        () => {
            if !buf.is_empty() {
                tokens.push(Token::Symbol(std::mem::take(&mut buf)));
            }
        };
    }

    for c in regex.chars() {
        match c {
            ' ' | '\t' => flush!(),
            '(' => {
                flush!();
                tokens.push(Token::LParen);
            }
            ')' => {
                flush!();
                tokens.push(Token::RParen);
            }
            '|' => {
                flush!();
                tokens.push(Token::Pipe);
            }
            '*' | '+' | '?' => {
                return Err(format!(
                    "repetition operator '{c}' is not supported (no Kleene star in this grammar)"
                ));
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == ':' => buf.push(c),
            c => return Err(format!("unexpected character '{c}' in regex")),
        }
    }
    flush!();

    if tokens.is_empty() {
        return Err("empty regex".to_string());
    }

    Ok(tokens)
}

impl FiniteAutomaton {
    fn push_state(&mut self) -> usize {
        self.states.push(FaState::default());
        self.states.len() - 1
    }

    /// Parses `regex` and builds its epsilon-free finite automaton.
    pub fn construct(regex: &str) -> Result<Self, AnacondaError> {
        let trimmed = regex.trim();
        let tokens = tokenize(trimmed).map_err(|reason| AnacondaError::ContractParse {
            line: trimmed.to_string(),
            reason,
        })?;

        let mut fa = FiniteAutomaton {
            states: Vec::new(),
            start: 0,
            regex: trimmed.to_string(),
            alphabet: HashSet::new(),
        };
        fa.start = fa.push_state();

        // A group's entry state (where '|' resets `current` to) and its
        // alternation-join state (allocated lazily on the first '|').
        let mut group_entries = vec![fa.start];
        let mut group_epsilons: Vec<Option<usize>> = vec![None];
        let mut current = fa.start;

        for token in tokens {
            match token {
                Token::Symbol(sym) => {
                    fa.alphabet.insert(sym.clone());
                    let next = fa.push_state();
                    fa.states[current].transitions.insert(sym, next);
                    current = next;
                }
                Token::LParen => {
                    group_entries.push(current);
                    group_epsilons.push(None);
                }
                Token::Pipe => {
                    let epsilon = *group_epsilons.last().unwrap();
                    let epsilon = match epsilon {
                        Some(e) => e,
                        None => {
                            let e = fa.push_state();
                            *group_epsilons.last_mut().unwrap() = Some(e);
                            e
                        }
                    };
                    fa.states[current]
                        .transitions
                        .insert(EPSILON.to_string(), epsilon);
                    current = *group_entries.last().unwrap();
                }
                Token::RParen => {
                    if group_entries.len() == 1 {
                        return Err(AnacondaError::ContractParse {
                            line: trimmed.to_string(),
                            reason: "unmatched ')'".to_string(),
                        });
                    }
                    if let Some(epsilon) = group_epsilons.pop().unwrap() {
                        fa.states[current]
                            .transitions
                            .insert(EPSILON.to_string(), epsilon);
                        current = epsilon;
                    } else {
                        group_epsilons.pop();
                    }
                    group_entries.pop();
                }
            }
        }

        if group_entries.len() != 1 {
            return Err(AnacondaError::ContractParse {
                line: trimmed.to_string(),
                reason: "unmatched '('".to_string(),
            });
        }

        // Close the implicit top-level group the same way an explicit ')'
        // would: redirect through the group's alternation-join state, if
        // any branch used '|' at the top level.
        if let Some(epsilon) = group_epsilons.pop().unwrap() {
            fa.states[current]
                .transitions
                .insert(EPSILON.to_string(), epsilon);
            current = epsilon;
        }

        fa.states[current].accepting = true;

        fa.eliminate_epsilons();

        Ok(fa)
    }

    /// Rewrites every transition to bypass chains of epsilon transitions,
    /// then deletes every state whose only role was such a chain hop.
    fn eliminate_epsilons(&mut self) {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut skipped = HashSet::new();

        visited.insert(self.start);
        queue.push_back(self.start);

        while let Some(cur) = queue.pop_front() {
            let outgoing: Vec<(String, usize)> = self.states[cur]
                .transitions
                .iter()
                .filter(|(sym, _)| !sym.is_empty())
                .map(|(sym, &target)| (sym.clone(), target))
                .collect();

            for (sym, mut target) in outgoing {
                while let Some(&next) = self.states[target].transitions.get(EPSILON) {
                    skipped.insert(target);
                    target = next;
                }
                self.states[cur].transitions.insert(sym, target);
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        let retained: Vec<usize> = {
            let mut v: Vec<usize> = visited.difference(&skipped).copied().collect();
            v.sort_unstable();
            v
        };
        let remap: HashMap<usize, usize> = retained
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_states = Vec::with_capacity(retained.len());
        for &old_idx in &retained {
            let old = &self.states[old_idx];
            let transitions = old
                .transitions
                .iter()
                .filter(|(sym, _)| !sym.is_empty())
                .map(|(sym, target)| (sym.clone(), remap[target]))
                .collect();
            new_states.push(FaState {
                transitions,
                accepting: old.accepting,
            });
        }

        self.start = remap[&self.start];
        self.states = new_states;
    }

    /// The regex this automaton was built from, for reporting.
    pub fn regex(&self) -> &str {
        &self.regex
    }

    /// The set of symbols that label any transition of this automaton.
    pub fn alphabet(&self) -> &HashSet<String> {
        &self.alphabet
    }

    /// The number of states in the automaton, for dump rendering.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Renders `state --symbol--> state` for every transition, and flags
    /// accepting states, per the contract-dump format.
    fn render_transitions(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, state) in self.states.iter().enumerate() {
            let mut symbols: Vec<&String> = state.transitions.keys().collect();
            symbols.sort();
            for sym in symbols {
                writeln!(f, "    {idx} --{sym}--> {}", state.transitions[sym])?;
            }
            if state.accepting {
                writeln!(f, "    {idx} (accepting)")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for FiniteAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  regex: {}", self.regex)?;
        self.render_transitions(f)
    }
}

/// A single run of a [`FiniteAutomaton`]: the current state plus a handle
/// to the shared, immutable automaton it runs over.
#[derive(Debug, Clone)]
pub struct FaRunner {
    fa: Arc<FiniteAutomaton>,
    current: usize,
}

impl FaRunner {
    /// Creates a new runner positioned at `fa`'s start state.
    pub fn new(fa: Arc<FiniteAutomaton>) -> Self {
        let current = fa.start;
        Self { fa, current }
    }

    /// Advances the run by one symbol. If `symbol` is outside the
    /// automaton's alphabet, the runner does not move and
    /// [`AdvanceResult::InvalidSymbol`] is returned.
    pub fn advance(&mut self, symbol: &str) -> AdvanceResult {
        if !self.fa.alphabet.contains(symbol) {
            return AdvanceResult::InvalidSymbol;
        }
        match self.fa.states[self.current].transitions.get(symbol) {
            Some(&next) => {
                self.current = next;
                AdvanceResult::MovedToNextState
            }
            None => AdvanceResult::NoTransitionFound,
        }
    }

    /// Returns `true` iff the current state is accepting.
    pub fn accepted(&self) -> bool {
        self.fa.states[self.current].accepting
    }

    /// Resets the run back to the automaton's start state.
    pub fn reset(&mut self) {
        self.current = self.fa.start;
    }

    /// The regex this runner's automaton was built from.
    pub fn regex(&self) -> &str {
        self.fa.regex()
    }
}
