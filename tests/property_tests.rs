// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

use anaconda_core::{AdvanceResult, FaRunner, FiniteAutomaton, LockClockTable, VectorClock};
use proptest::prelude::*;
use std::sync::Arc;

fn arb_clock_updates() -> impl Strategy<Value = Vec<(usize, u64)>> {
    prop::collection::vec((0usize..8, 1u64..100), 0..10)
}

fn build_clock(updates: &[(usize, u64)]) -> VectorClock {
    let mut vc = VectorClock::new();
    for &(tid, value) in updates {
        vc.update(tid, value);
    }
    vc
}

fn arb_symbols() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 1..6)
}

proptest! {
    // Invariant 1 (§8): for any thread t, cvc(t)[t] is strictly
    // non-decreasing over its lifetime. `increment` is the only operation
    // that ever touches a thread's own slot after `init`, so every clock
    // snapshot taken along the way must happen-before the next.
    #[test]
    fn clock_increment_is_monotonic(n in 0usize..20) {
        let mut vc = VectorClock::new();
        vc.init(0);
        let mut previous = vc.clone();
        for _ in 0..n {
            vc.increment(0);
            prop_assert!(previous.hb(&vc, 0));
            previous = vc.clone();
        }
    }

    // Invariant 2 (§8): after release(lock) then acquire(lock) by
    // different threads, the acquirer's clock dominates its pre-acquire
    // clock on every slot the releaser's clock carried.
    #[test]
    fn release_then_acquire_never_moves_a_slot_backwards(
        releaser in arb_clock_updates(),
        acquirer in arb_clock_updates(),
    ) {
        let table = LockClockTable::new();
        let mut releaser_clock = build_clock(&releaser);
        let before = build_clock(&acquirer);
        let mut acquirer_clock = before.clone();

        table.release(1, 0, &mut releaser_clock);
        table.acquire(1, &mut acquirer_clock);

        for tid in 0..8 {
            prop_assert!(before.hb(&acquirer_clock, tid));
        }
    }

    // Invariant 3 (§8), acceptance half: any sequence of symbols matching
    // the source regex ends in an accepting state.
    #[test]
    fn fa_accepts_any_sequence_matching_its_own_regex(symbols in arb_symbols()) {
        let regex = symbols.join(" ");
        let fa = Arc::new(FiniteAutomaton::construct(&regex).unwrap());
        let mut runner = FaRunner::new(fa);
        for symbol in &symbols {
            prop_assert_eq!(runner.advance(symbol), AdvanceResult::MovedToNextState);
        }
        prop_assert!(runner.accepted());
    }

    // Round-trip/idempotence (§8): advance with an out-of-alphabet symbol
    // is an identity on runner state — it neither changes whether the
    // runner is accepting nor derails a sequence already in progress.
    #[test]
    fn advance_with_unknown_symbol_is_an_identity(
        symbols in arb_symbols(),
        bogus in "[A-Z]{1,6}",
    ) {
        let regex = symbols.join(" ");
        let fa = Arc::new(FiniteAutomaton::construct(&regex).unwrap());
        prop_assume!(!fa.alphabet().contains(&bogus));
        let mut runner = FaRunner::new(fa);

        let split = symbols.len() / 2;
        for symbol in &symbols[..split] {
            runner.advance(symbol);
        }
        let accepted_before = runner.accepted();

        prop_assert_eq!(runner.advance(&bogus), AdvanceResult::InvalidSymbol);
        prop_assert_eq!(runner.accepted(), accepted_before);

        for symbol in &symbols[split..] {
            runner.advance(symbol);
        }
        prop_assert!(runner.accepted());
    }
}
