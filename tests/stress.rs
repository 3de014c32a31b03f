//! Multi-threaded stress tests: S4 (MPMC queue conservation), S5
//! (stale handle under pool contention), S6 (single-slot ABA).

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use anamnesis::{Pool, PoolConfig, Queue, QueueConfig};

/// S4: 4 producers push 5000 items each, 4 consumers drain
/// concurrently; every pushed value must be popped exactly once.
#[test]
fn scenario_mpmc_queue_conservation() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 5000;
    const TOTAL: u64 = PRODUCERS * PER_PRODUCER;

    let queue = Queue::new(
        QueueConfig::default()
            .with_item_size(std::mem::size_of::<u64>())
            .with_capacity((TOTAL as usize) + 1),
    )
    .unwrap();

    let popped_sum = AtomicU64::new(0);
    let popped_count = AtomicU64::new(0);

    thread::scope(|scope| {
        for p in 0..PRODUCERS {
            let queue = &queue;
            scope.spawn(move || {
                for i in 0..PER_PRODUCER {
                    let value = p * PER_PRODUCER + i;
                    while queue.push(&value.to_le_bytes()).is_none() {
                        thread::yield_now();
                    }
                }
            });
        }

        for _ in 0..4 {
            let queue = &queue;
            let popped_sum = &popped_sum;
            let popped_count = &popped_count;
            scope.spawn(move || {
                let mut buf = [0u8; 8];
                loop {
                    if queue.pop(&mut buf) {
                        popped_sum.fetch_add(u64::from_le_bytes(buf), Ordering::Relaxed);
                        let n = popped_count.fetch_add(1, Ordering::Relaxed) + 1;
                        if n == TOTAL {
                            return;
                        }
                    } else if popped_count.load(Ordering::Relaxed) == TOTAL {
                        return;
                    } else {
                        thread::yield_now();
                    }
                }
            });
        }
    });

    assert_eq!(popped_count.load(Ordering::Relaxed), TOTAL);
    let expected_sum: u64 = (0..TOTAL).sum();
    assert_eq!(popped_sum.load(Ordering::Relaxed), expected_sum);
    assert!(queue.is_empty());
}

/// S5: under contention, a handle captured then released by another
/// thread must never validate again, and the pool's conservation
/// invariant must hold once all threads have finished.
#[test]
fn scenario_stale_handle_under_contention() {
    let pool = Pool::new(PoolConfig::default().with_slot_size(8).with_slot_count(64)).unwrap();

    let handles: Vec<_> = (0..10).map(|_| pool.alloc().unwrap()).collect();

    thread::scope(|scope| {
        for (i, &h) in handles.iter().enumerate() {
            let pool = &pool;
            scope.spawn(move || {
                if i % 2 == 0 {
                    assert!(pool.release(h));
                } else {
                    // Racing validations of a handle nobody released yet
                    // must still see it live.
                    assert!(pool.validate(h));
                }
            });
        }
    });

    for (i, &h) in handles.iter().enumerate() {
        if i % 2 == 0 {
            assert!(!pool.validate(h), "released handle must now be stale");
        } else {
            assert!(pool.validate(h), "never-released handle must stay live");
            assert!(pool.release(h));
        }
    }

    let snap = pool.stats();
    assert_eq!(
        snap.alloc_count - snap.release_count,
        (pool.slot_count() - snap.slots_free) as u64
    );
}

/// S6: a single-slot pool. One thread captures a handle, a second
/// thread releases and reallocates the same slot several times; the
/// first thread's captured handle must never re-validate.
#[test]
fn scenario_single_slot_aba() {
    let pool = Pool::new(PoolConfig::default().with_slot_size(8).with_slot_count(1)).unwrap();
    let captured = pool.alloc().unwrap();
    assert!(pool.release(captured));

    thread::scope(|scope| {
        let pool = &pool;
        scope.spawn(move || {
            for _ in 0..64 {
                if let Some(h) = pool.alloc() {
                    pool.release(h);
                }
            }
        });
    });

    assert!(
        !pool.validate(captured),
        "a handle captured before 64 release/realloc cycles must not coincidentally re-validate"
    );
}
