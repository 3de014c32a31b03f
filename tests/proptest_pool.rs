//! Property tests: generation monotonicity and conservation across
//! randomized alloc/release sequences.

use anamnesis::{Pool, PoolConfig};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Alloc,
    Release(usize),
}

fn op_strategy(live_upper_bound: usize) -> impl Strategy<Value = Op> {
    if live_upper_bound == 0 {
        Just(Op::Alloc).boxed()
    } else {
        prop_oneof![
            3 => Just(Op::Alloc),
            2 => (0..live_upper_bound).prop_map(Op::Release),
        ]
        .boxed()
    }
}

fn op_sequence(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    // A hand-rolled variable-length sequence: each step's strategy
    // depends on how many handles would plausibly be live by then, so
    // a plain `vec(...)` over one fixed strategy would not do — this
    // just caps releases to a generous index range and lets the test
    // body skip out-of-range picks instead of modeling state in the
    // strategy itself.
    prop::collection::vec(op_strategy(max_ops), 0..max_ops)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Generation is monotonically non-decreasing for any single slot
    /// across a randomized sequence of alloc/release calls, and
    /// `alloc_count - release_count` always equals the live slot
    /// count (conservation), regardless of interleaving order.
    #[test]
    fn generation_monotonic_and_conserved(ops in op_sequence(64)) {
        let pool = Pool::new(
            PoolConfig::default().with_slot_size(8).with_slot_count(8)
        ).unwrap();

        let mut live: Vec<_> = Vec::new();
        let mut last_generation_by_addr = std::collections::HashMap::new();

        for op in ops {
            match op {
                Op::Alloc => {
                    if let Some(h) = pool.alloc() {
                        if let Some(&prev) = last_generation_by_addr.get(&h.addr()) {
                            prop_assert!(h.generation() >= prev);
                        }
                        last_generation_by_addr.insert(h.addr(), h.generation());
                        live.push(h);
                    }
                }
                Op::Release(idx) => {
                    if !live.is_empty() {
                        let h = live.remove(idx % live.len());
                        prop_assert!(pool.release(h));
                    }
                }
            }

            let snap = pool.stats();
            prop_assert_eq!(
                snap.alloc_count - snap.release_count,
                (pool.slot_count() - snap.slots_free) as u64
            );
            prop_assert_eq!(live.len(), (pool.slot_count() - snap.slots_free));
        }

        for h in live {
            prop_assert!(pool.release(h));
        }
    }
}
