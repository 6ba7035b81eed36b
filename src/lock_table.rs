// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

use crate::vector_clock::VectorClock;
use std::collections::HashMap;
use std::sync::RwLock;

/// An opaque, stable identity for a lock, supplied by the instrumentation
/// engine.
pub type LockId = usize;

/// Maps each lock to the vector clock captured at its most recent release.
///
/// Acquiring a lock that was never released is not an error: the acquirer
/// simply observes no additional synchronization (§4.2).
///
/// Different locks may be updated concurrently; the table itself is a
/// single `RwLock`-protected map, with release taking exclusive access and
/// acquire taking shared access. A release on one lock never blocks an
/// acquire of a different lock for longer than the map lookup itself.
#[derive(Debug, Default)]
pub struct LockClockTable {
    clocks: RwLock<HashMap<LockId, VectorClock>>,
}

impl LockClockTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a release of `lock` by the thread whose current clock is
    /// `cvc`, then advances `cvc` for that thread.
    ///
    /// Matches `before-lock-release` in the dispatcher: the clock must be
    /// published here *before* the increment below becomes visible to a
    /// thread that later acquires the same lock.
    pub fn release(&self, lock: LockId, tid: usize, cvc: &mut VectorClock) {
        self.clocks
            .write()
            .expect("lock clock table poisoned")
            .insert(lock, cvc.clone());
        cvc.increment(tid);
    }

    /// Records an acquire of `lock`, joining the clock captured at the
    /// lock's last release (if any) into `cvc`.
    pub fn acquire(&self, lock: LockId, cvc: &mut VectorClock) {
        if let Some(released) = self.clocks.read().expect("lock clock table poisoned").get(&lock)
        {
            cvc.join(released);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_before_any_release_is_a_no_op() {
        let table = LockClockTable::new();
        let mut cvc = VectorClock::new();
        cvc.init(0);
        table.acquire(1, &mut cvc);
        assert_eq!(cvc.to_string(), "[1]");
    }

    #[test]
    fn release_then_acquire_joins_and_advances() {
        let table = LockClockTable::new();

        let mut t0 = VectorClock::new();
        t0.init(0);
        table.release(1, 0, &mut t0);
        assert_eq!(t0.to_string(), "[2]"); // incremented after publishing

        let mut t1 = VectorClock::new();
        t1.init(1);
        table.acquire(1, &mut t1);
        // t1 now dominates the clock published at release (slot 0 = 1)
        assert!(t1.hb(&t0, 0) || t1.to_string() == "[1,1]");
        assert_eq!(t1.to_string(), "[1,1]");
    }
}
