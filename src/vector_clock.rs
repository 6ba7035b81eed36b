// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A per-thread logical clock used to track the happens-before relation.
///
/// Each slot of the clock holds the number of events thread `i` has
/// performed as observed by the clock's owner. A clock is *valid* once it
/// has been [`init`](VectorClock::init)ialised for some thread; an
/// uninitialised (default, empty) clock compares as happening-before
/// everything and after nothing.
///
/// # Causal properties
/// - `a` happens-before `b` with respect to thread `t` iff `a[t] <= b[t]`.
/// - [`join`](VectorClock::join) takes the per-slot maximum of two clocks,
///   the standard way logical time is propagated across synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct VectorClock {
    entries: Vec<u64>,
}

impl VectorClock {
    /// Returns a new, uninitialised (invalid) vector clock.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, tid: usize) -> u64 {
        self.entries.get(tid).copied().unwrap_or(0)
    }

    fn ensure_len(&mut self, len: usize) {
        if self.entries.len() < len {
            self.entries.resize(len, 0);
        }
    }

    /// Initialises the clock for thread `tid`: grows to `tid + 1` entries
    /// (zero-filled) and sets slot `tid` to 1.
    ///
    /// Only meaningful the first time a thread's clock is created; calling
    /// it again on an already-initialised clock is not supported by any
    /// caller in this crate.
    pub fn init(&mut self, tid: usize) {
        self.ensure_len(tid + 1);
        self.entries[tid] = 1;
    }

    /// Increments slot `tid`. The clock must already have been
    /// [`init`](VectorClock::init)ialised for `tid`.
    pub fn increment(&mut self, tid: usize) {
        self.entries[tid] += 1;
    }

    /// Sets slot `tid` to `value`, growing the clock with zeros if needed.
    ///
    /// The caller is responsible for `value >= self[tid]`: clocks only
    /// ever move forward.
    pub fn update(&mut self, tid: usize, value: u64) {
        self.ensure_len(tid + 1);
        self.entries[tid] = value;
    }

    /// Joins `other` into this clock: every slot becomes the maximum of
    /// the two, treating entries missing from either side as zero.
    pub fn join(&mut self, other: &VectorClock) {
        self.ensure_len(other.entries.len());
        for (i, &v) in other.entries.iter().enumerate() {
            if v > self.entries[i] {
                self.entries[i] = v;
            }
        }
    }

    /// Returns the set of threads this clock has observed any event from.
    pub fn seen(&self) -> HashSet<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns `true` iff this clock happens-before `other` with respect
    /// to thread `tid`, i.e. `self[tid] <= other[tid]`.
    ///
    /// This is the single-axis test the violation detector needs, not a
    /// full vector comparison.
    pub fn hb(&self, other: &VectorClock, tid: usize) -> bool {
        self.slot(tid) <= other.slot(tid)
    }

    /// Returns `true` iff the clock has ever been initialised, i.e. it
    /// carries at least one nonzero slot.
    pub fn valid(&self) -> bool {
        self.entries.iter().any(|&v| v > 0)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_sets_own_slot_to_one() {
        let mut vc = VectorClock::new();
        assert!(!vc.valid());
        vc.init(2);
        assert!(vc.valid());
        assert_eq!(vc.slot(2), 1);
        assert_eq!(vc.slot(0), 0);
    }

    #[test]
    fn increment_only_touches_owner_slot() {
        let mut vc = VectorClock::new();
        vc.init(0);
        vc.increment(0);
        vc.increment(0);
        assert_eq!(vc.slot(0), 3);
    }

    #[test]
    fn join_takes_per_slot_max() {
        let mut a = VectorClock::new();
        a.init(0);
        a.update(1, 5);

        let mut b = VectorClock::new();
        b.init(1);
        b.update(0, 7);

        a.join(&b);
        assert_eq!(a.slot(0), 7);
        assert_eq!(a.slot(1), 5);
    }

    #[test]
    fn hb_is_single_axis() {
        let mut a = VectorClock::new();
        a.update(0, 1);
        a.update(1, 9);

        let mut b = VectorClock::new();
        b.update(0, 2);
        b.update(1, 0);

        // a[0]=1 <= b[0]=2, regardless of slot 1 being larger in a.
        assert!(a.hb(&b, 0));
        assert!(!a.hb(&b, 1));
    }

    #[test]
    fn hb_missing_slots_read_as_zero() {
        let mut a = VectorClock::new();
        a.update(3, 1);
        let b = VectorClock::new();
        assert!(!a.hb(&b, 3));
        assert!(b.hb(&a, 3));
    }

    #[test]
    fn display_renders_bracketed_list() {
        let mut vc = VectorClock::new();
        vc.update(0, 1);
        vc.update(1, 2);
        vc.update(2, 3);
        assert_eq!(vc.to_string(), "[1,2,3]");
    }
}
