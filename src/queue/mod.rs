//! A lock-free, bounded, multi-producer multi-consumer FIFO queue
//! implementing the Michael–Scott algorithm over a dedicated
//! [`Pool`](crate::pool::Pool).
//!
//! A queue node is a pool slot shaped `[ atomic next-handle | item
//! bytes ]`; using a pool [`Handle`] as the link field gives every CAS
//! in the enqueue/dequeue loops ABA immunity for free, since two
//! incarnations of the same physical node are two different handle
//! values. A permanent dummy node, allocated at construction, is
//! always the last node released, at queue destruction.

mod stats;

use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::QueueError;
use crate::handle::Handle;
use crate::pool::{Pool, PoolConfig};
use crate::utils::Backoff;

pub use stats::{QueueStats, QueueStatsSnapshot};

/// Configuration for [`Queue::new`].
///
/// Defaults mirror the reference implementation's `ANAM_QUEUE_DEFAULT`:
/// a capacity of 1024 items of 64 bytes each.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Fixed size in bytes of every item pushed through this queue.
    pub item_size: usize,
    /// Maximum number of items the queue holds at once (the backing
    /// pool is sized `capacity + 1` for the permanent dummy node).
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            item_size: 64,
            capacity: 1024,
        }
    }
}

impl QueueConfig {
    /// Sets the fixed per-item size.
    pub fn with_item_size(mut self, item_size: usize) -> Self {
        self.item_size = item_size;
        self
    }

    /// Sets the queue's capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// A lock-free MPMC FIFO queue of fixed-size items.
pub struct Queue {
    item_size: usize,
    capacity: usize,
    pool: Pool,
    head: AtomicU64,
    tail: AtomicU64,
    length: AtomicUsize,
    stats: QueueStats,
}

impl Queue {
    /// Builds a new queue, including its dedicated backing pool.
    pub fn new(config: QueueConfig) -> Result<Queue, QueueError> {
        let QueueConfig { item_size, capacity } = config;
        if item_size == 0 {
            return Err(log_config_error(QueueError::ZeroItemSize));
        }
        if capacity == 0 {
            return Err(log_config_error(QueueError::ZeroCapacity));
        }

        let node_size = mem::size_of::<AtomicU64>() + item_size;
        let pool = Pool::new(
            PoolConfig::default()
                .with_slot_size(node_size)
                .with_slot_count(capacity + 1)
                .with_alignment(mem::align_of::<AtomicU64>().max(8)),
        )
        .map_err(|e| log_config_error(QueueError::Pool(e)))?;

        let dummy = pool
            .alloc()
            .ok_or_else(|| log_config_error(QueueError::DummyAllocationFailed))?;
        // Safety: `dummy` was just allocated, not yet reachable from
        // any other thread.
        let dummy_payload = pool.get(dummy).expect("freshly allocated dummy must validate");
        unsafe {
            (*next_ptr(dummy_payload)).store(Handle::NULL.raw(), Ordering::Relaxed);
        }

        let queue = Queue {
            item_size,
            capacity,
            pool,
            head: AtomicU64::new(dummy.raw()),
            tail: AtomicU64::new(dummy.raw()),
            length: AtomicUsize::new(0),
            stats: QueueStats::default(),
        };
        tracing::debug!(item_size, capacity, "queue constructed");
        Ok(queue)
    }

    fn item_ptr(&self, payload: NonNull<u8>) -> *mut u8 {
        // Safety: every node this pool hands back is at least
        // `size_of::<AtomicU64>() + item_size` bytes, per construction.
        unsafe { payload.as_ptr().add(mem::size_of::<AtomicU64>()) }
    }

    /// Pushes a copy of `item` onto the tail of the queue. Returns the
    /// new node's handle, or `None` if the backing pool is exhausted
    /// (the queue is at capacity).
    ///
    /// # Panics
    /// Panics if `item.len() != item_size` — a fixed-item-size queue
    /// receiving a mismatched item is a caller bug, not a runtime
    /// condition to recover from.
    pub fn push(&self, item: &[u8]) -> Option<Handle> {
        assert_eq!(
            item.len(),
            self.item_size,
            "item length must equal the queue's configured item_size"
        );

        let node = match self.pool.alloc() {
            Some(node) => node,
            None => {
                self.stats.record_push_fail();
                return None;
            }
        };
        let node_payload = self
            .pool
            .get(node)
            .expect("freshly allocated handle must validate");
        // Safety: `node` is not yet linked from `tail.next`, so no
        // other thread can observe it until the CAS below succeeds.
        unsafe {
            (*next_ptr(node_payload)).store(Handle::NULL.raw(), Ordering::Relaxed);
            std::ptr::copy_nonoverlapping(item.as_ptr(), self.item_ptr(node_payload), self.item_size);
        }

        let mut backoff = Backoff::new();
        let observed_tail = loop {
            let tail_raw = self.tail.load(Ordering::Acquire);
            let tail = Handle::from_raw(tail_raw);
            let Some(tail_payload) = self.pool.get(tail) else {
                self.stats.record_aba_prevented();
                backoff.spin();
                continue;
            };
            // Safety: `tail_payload` validated above.
            let next_handle = unsafe { &*next_ptr(tail_payload) };
            let next_raw = next_handle.load(Ordering::Acquire);

            if self.tail.load(Ordering::Acquire) != tail_raw {
                self.stats.record_aba_prevented();
                backoff.spin();
                continue;
            }

            if Handle::from_raw(next_raw).is_null() {
                match next_handle.compare_exchange_weak(
                    next_raw,
                    node.raw(),
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break tail_raw,
                    Err(_) => backoff.spin(),
                }
            } else {
                // Tail is lagging behind the last real node; help
                // swing it forward before retrying.
                let _ = self.tail.compare_exchange(
                    tail_raw,
                    next_raw,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                backoff.spin();
            }
        };

        // Not required for correctness (the next producer or consumer
        // will help swing it), but keeps `tail` fresh on the common
        // uncontended path.
        let _ = self.tail.compare_exchange(
            observed_tail,
            node.raw(),
            Ordering::Release,
            Ordering::Relaxed,
        );
        self.length.fetch_add(1, Ordering::Relaxed);
        self.stats.record_push();
        Some(node)
    }

    /// Pops the head item into `out`. Returns `false` if the queue was
    /// empty.
    ///
    /// # Panics
    /// Panics if `out.len() != item_size`.
    pub fn pop(&self, out: &mut [u8]) -> bool {
        assert_eq!(
            out.len(),
            self.item_size,
            "out length must equal the queue's configured item_size"
        );

        let mut backoff = Backoff::new();
        loop {
            let head_raw = self.head.load(Ordering::Acquire);
            let tail_raw = self.tail.load(Ordering::Acquire);
            let head = Handle::from_raw(head_raw);
            let Some(head_payload) = self.pool.get(head) else {
                self.stats.record_aba_prevented();
                backoff.spin();
                continue;
            };
            // Safety: `head_payload` validated above.
            let next_handle = unsafe { &*next_ptr(head_payload) };
            let next_raw = next_handle.load(Ordering::Acquire);

            if self.head.load(Ordering::Acquire) != head_raw {
                self.stats.record_aba_prevented();
                backoff.spin();
                continue;
            }

            if head_raw == tail_raw {
                if Handle::from_raw(next_raw).is_null() {
                    self.stats.record_pop_fail();
                    return false;
                }
                // Tail is lagging; help it catch up and retry.
                let _ = self.tail.compare_exchange(
                    tail_raw,
                    next_raw,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                backoff.spin();
                continue;
            }

            let next = Handle::from_raw(next_raw);
            let Some(next_payload) = self.pool.get(next) else {
                self.stats.record_aba_prevented();
                backoff.spin();
                continue;
            };
            // Copy before the head CAS: once it succeeds, the old
            // head node is released and may be reused by a concurrent
            // pusher before we get a chance to read it.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.item_ptr(next_payload),
                    out.as_mut_ptr(),
                    self.item_size,
                );
            }

            match self.head.compare_exchange_weak(
                head_raw,
                next_raw,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.pool.release(head);
                    self.length.fetch_sub(1, Ordering::Relaxed);
                    self.stats.record_pop();
                    return true;
                }
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Copies the head item into `out` without removing it. Not
    /// linearizable against concurrent mutators — by the time the
    /// caller reads `out`, a racing `pop` may have already removed
    /// that item — but never returns corrupted bytes, since head and
    /// its successor are both revalidated through `get` before the
    /// copy.
    ///
    /// # Panics
    /// Panics if `out.len() != item_size`.
    pub fn peek(&self, out: &mut [u8]) -> bool {
        assert_eq!(
            out.len(),
            self.item_size,
            "out length must equal the queue's configured item_size"
        );

        let mut backoff = Backoff::new();
        loop {
            let head_raw = self.head.load(Ordering::Acquire);
            let tail_raw = self.tail.load(Ordering::Acquire);
            let head = Handle::from_raw(head_raw);
            let Some(head_payload) = self.pool.get(head) else {
                backoff.spin();
                continue;
            };
            let next_raw = unsafe { &*next_ptr(head_payload) }.load(Ordering::Acquire);

            if self.head.load(Ordering::Acquire) != head_raw {
                backoff.spin();
                continue;
            }

            if head_raw == tail_raw {
                if Handle::from_raw(next_raw).is_null() {
                    return false;
                }
                backoff.spin();
                continue;
            }

            let next = Handle::from_raw(next_raw);
            let Some(next_payload) = self.pool.get(next) else {
                backoff.spin();
                continue;
            };
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.item_ptr(next_payload),
                    out.as_mut_ptr(),
                    self.item_size,
                );
            }
            return true;
        }
    }

    /// `true` iff the queue currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The queue's current length. Eventually consistent under
    /// concurrent mutators, same as `Pool::stats`.
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Relaxed)
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A snapshot of this queue's counters.
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.stats.snapshot(self.capacity)
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        let mut scratch = vec![0u8; self.item_size];
        while self.pop(&mut scratch) {}
        let dummy = Handle::from_raw(self.head.load(Ordering::Relaxed));
        self.pool.release(dummy);
        tracing::debug!(capacity = self.capacity, "queue destroyed");
    }
}

#[inline]
fn next_ptr(payload: NonNull<u8>) -> *const AtomicU64 {
    payload.as_ptr().cast()
}

fn log_config_error(err: QueueError) -> QueueError {
    tracing::warn!(error = %err, "queue construction rejected");
    err
}
