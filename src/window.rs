// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! The per-thread trace window: a sparse matrix of target/spoiler instance
//! tracking, and the cross-thread violation detector that runs over it.

use crate::contract::Contract;
use crate::fa::{AdvanceResult, FaRunner};
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A single detected contract violation: a spoiler instance that was not
/// happens-before ordered with an overlapping target instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub target_regex: String,
    pub target_tid: usize,
    pub spoiler_regex: String,
    pub spoiler_tid: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Contract violation detected!")?;
        writeln!(
            f,
            "  Target [Thread {}]: {}",
            self.target_tid, self.target_regex
        )?;
        write!(
            f,
            "  Spoiler [Thread {}]: {}",
            self.spoiler_tid, self.spoiler_regex
        )
    }
}

struct InstanceState {
    running_started: bool,
    running_start: VectorClock,
    runner: FaRunner,
    last_start: Option<VectorClock>,
    last_end: Option<VectorClock>,
}

impl InstanceState {
    fn new(runner: FaRunner) -> Self {
        Self {
            running_started: false,
            running_start: VectorClock::new(),
            runner,
            last_start: None,
            last_end: None,
        }
    }
}

/// Tracking state for one target or spoiler, within one thread's window.
///
/// Every field lives behind a single reader-writer lock: readers (this
/// thread checking acceptance, or a peer thread reading `last`) take a
/// shared lock; a commit takes an exclusive one. This keeps the read in a
/// violation check and the commit that follows it from interleaving with a
/// concurrent peer read in a way that would see a torn `last`.
struct Instances {
    state: RwLock<InstanceState>,
    /// For a target: the spoiler types that may violate it. For a
    /// spoiler: a single-element list containing the target it may
    /// violate.
    conflicting: Vec<usize>,
}

impl Instances {
    fn new(runner: FaRunner) -> Self {
        Self {
            state: RwLock::new(InstanceState::new(runner)),
            conflicting: Vec::new(),
        }
    }
}

/// The "overlap" test (§4.6): true iff neither instance's completion was
/// ordered before the other's start by any observed synchronization —
/// i.e. nothing proves they were serialized, so they must be treated as
/// having run concurrently.
fn overlaps(t_start: &VectorClock, t_end: &VectorClock, tt: usize, s_start: &VectorClock, s_end: &VectorClock, st: usize) -> bool {
    !s_start.hb(t_start, st) && !t_end.hb(s_end, tt)
}

/// A thread's trace window: at most one running and one last-completed
/// instance of each target and spoiler type. The arrays are sized and
/// populated once, by [`Window::monitor`], and never resized afterwards —
/// only the interior [`Instances`] locks mutate.
pub struct Window {
    tid: usize,
    targets: Vec<Option<Instances>>,
    spoilers: Vec<Option<Instances>>,
}

impl Window {
    /// Builds a window populated with an `Instances` slot for every
    /// target and spoiler in `contract`, with conflict lists filled in.
    pub fn monitor(tid: usize, contract: &Contract) -> Self {
        let mut targets: Vec<Option<Instances>> = (0..contract.targets().len())
            .map(|_| None::<Instances>)
            .collect();
        let mut spoilers: Vec<Option<Instances>> = (0..contract.spoilers().len())
            .map(|_| None::<Instances>)
            .collect();

        for target in contract.targets() {
            let mut instances = Instances::new(FaRunner::new(target.fa.clone()));
            instances.conflicting = target.spoilers.clone();
            targets[target.id] = Some(instances);
        }
        for spoiler in contract.spoilers() {
            let mut instances = Instances::new(FaRunner::new(spoiler.fa.clone()));
            instances.conflicting = vec![spoiler.target];
            spoilers[spoiler.id] = Some(instances);
        }

        Self {
            tid,
            targets,
            spoilers,
        }
    }

    pub fn tid(&self) -> usize {
        self.tid
    }

    fn advance(instance: &Instances, name: &str, cvc: &VectorClock) {
        let mut state = instance.state.write().expect("instance lock poisoned");
        match state.runner.advance(name) {
            AdvanceResult::MovedToNextState => {
                if !state.running_started {
                    state.running_started = true;
                    state.running_start = cvc.clone();
                }
            }
            AdvanceResult::NoTransitionFound => {
                state.running_started = false;
                state.runner.reset();
            }
            AdvanceResult::InvalidSymbol => {}
        }
    }

    /// Tries to advance every tracked target and spoiler by `name`.
    pub fn function_entered(&self, name: &str, cvc: &VectorClock) {
        for instance in self.targets.iter().flatten() {
            Self::advance(instance, name, cvc);
        }
        for instance in self.spoilers.iter().flatten() {
            Self::advance(instance, name, cvc);
        }
    }

    /// Checks every target/spoiler instance that just completed an
    /// accepting run against the conflicting instances of every other
    /// thread's window, then commits it into `last`.
    pub fn function_exited(&self, name: &str, cvc: &VectorClock, peers: &[Arc<Window>]) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (target_id, maybe_target) in self.targets.iter().enumerate() {
            let Some(target) = maybe_target else { continue };
            let t_guard = target.state.read().expect("instance lock poisoned");
            if !t_guard.runner.accepted() {
                continue;
            }
            let t_start = t_guard.running_start.clone();
            let t_end = cvc.clone();
            let t_regex = t_guard.runner.regex().to_string();

            for peer in peers {
                if peer.tid == self.tid {
                    continue;
                }
                for &spoiler_id in &target.conflicting {
                    let Some(Some(peer_spoiler)) = peer.spoilers.get(spoiler_id) else {
                        continue;
                    };
                    let s_guard = peer_spoiler.state.read().expect("instance lock poisoned");
                    if let (Some(s_start), Some(s_end)) =
                        (s_guard.last_start.as_ref(), s_guard.last_end.as_ref())
                    {
                        if overlaps(&t_start, &t_end, self.tid, s_start, s_end, peer.tid) {
                            violations.push(Violation {
                                target_regex: t_regex.clone(),
                                target_tid: self.tid,
                                spoiler_regex: s_guard.runner.regex().to_string(),
                                spoiler_tid: peer.tid,
                            });
                        }
                    }
                }
            }
            drop(t_guard);

            debug!(thread = self.tid, target = target_id, name, "target instance committed");
            let mut w = target.state.write().expect("instance lock poisoned");
            w.last_start = Some(t_start);
            w.last_end = Some(t_end);
            w.running_started = false;
            w.runner.reset();
        }

        for (spoiler_id, maybe_spoiler) in self.spoilers.iter().enumerate() {
            let Some(spoiler) = maybe_spoiler else { continue };
            let s_guard = spoiler.state.read().expect("instance lock poisoned");
            if !s_guard.runner.accepted() {
                continue;
            }
            let s_start = s_guard.running_start.clone();
            let s_end = cvc.clone();
            let s_regex = s_guard.runner.regex().to_string();

            for peer in peers {
                if peer.tid == self.tid {
                    continue;
                }
                for &target_id in &spoiler.conflicting {
                    let Some(Some(peer_target)) = peer.targets.get(target_id) else {
                        continue;
                    };
                    let t_guard = peer_target.state.read().expect("instance lock poisoned");
                    if let (Some(t_start), Some(t_end)) =
                        (t_guard.last_start.as_ref(), t_guard.last_end.as_ref())
                    {
                        if overlaps(t_start, t_end, peer.tid, &s_start, &s_end, self.tid) {
                            violations.push(Violation {
                                target_regex: t_guard.runner.regex().to_string(),
                                target_tid: peer.tid,
                                spoiler_regex: s_regex.clone(),
                                spoiler_tid: self.tid,
                            });
                        }
                    }
                }
            }
            drop(s_guard);

            debug!(thread = self.tid, spoiler = spoiler_id, name, "spoiler instance committed");
            let mut w = spoiler.state.write().expect("instance lock poisoned");
            w.last_start = Some(s_start);
            w.last_end = Some(s_end);
            w.running_started = false;
            w.runner.reset();
        }

        violations
    }
}

/// The set of all threads' windows, keyed by thread id. Append-only for
/// the process lifetime: entries created on thread-started are retained
/// after thread-finished so a peer's late read of `last` stays valid
/// (§5).
#[derive(Default)]
pub struct WindowRegistry {
    windows: RwLock<HashMap<usize, Arc<Window>>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, window: Arc<Window>) {
        self.windows
            .write()
            .expect("window registry poisoned")
            .insert(window.tid(), window);
    }

    pub fn get(&self, tid: usize) -> Option<Arc<Window>> {
        self.windows.read().expect("window registry poisoned").get(&tid).cloned()
    }

    /// A snapshot of every window, for scanning during violation
    /// detection. Cloning `Arc`s rather than holding the registry lock
    /// for the scan lets other threads register new windows concurrently.
    pub fn snapshot(&self) -> Vec<Arc<Window>> {
        self.windows
            .read()
            .expect("window registry poisoned")
            .values()
            .cloned()
            .collect()
    }
}
