//! Statistics for a single [`super::Queue`].

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Live counters for a queue. Relaxed throughout, same rationale as
/// [`crate::pool::PoolStats`]: observability only, never load-bearing.
#[derive(Debug, Default)]
pub struct QueueStats {
    pub(crate) push_count: AtomicU64,
    pub(crate) pop_count: AtomicU64,
    pub(crate) push_fails: AtomicU64,
    pub(crate) pop_fails: AtomicU64,
    pub(crate) aba_prevented: AtomicU64,
}

impl QueueStats {
    pub(crate) fn record_push(&self) {
        self.push_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pop(&self) {
        self.pop_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_push_fail(&self) {
        self.push_fails.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pop_fail(&self) {
        self.pop_fails.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a retry caused by a head/tail handle that failed
    /// revalidation mid-loop — the queue's counterpart to the pool's
    /// `anamnesis_count`, except here staleness is an expected
    /// transient under contention, not necessarily a counterfeit.
    pub(crate) fn record_aba_prevented(&self) {
        self.aba_prevented.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshots the current counters into a plain, `Copy` struct.
    pub fn snapshot(&self, capacity: usize) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            capacity,
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            push_fails: self.push_fails.load(Ordering::Relaxed),
            pop_fails: self.pop_fails.load(Ordering::Relaxed),
            aba_prevented: self.aba_prevented.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    /// The queue's fixed capacity.
    pub capacity: usize,
    /// Total successful `push` calls since construction.
    pub push_count: u64,
    /// Total successful `pop` calls since construction.
    pub pop_count: u64,
    /// Total `push` calls that found the backing pool exhausted.
    pub push_fails: u64,
    /// Total `pop` calls that found the queue empty.
    pub pop_fails: u64,
    /// Total retries caused by a head/tail handle going stale
    /// mid-loop under concurrent contention.
    pub aba_prevented: u64,
}

impl fmt::Display for QueueStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "capacity={} push={} pop={} push_fails={} pop_fails={} aba_prevented={}",
            self.capacity, self.push_count, self.pop_count, self.push_fails, self.pop_fails,
            self.aba_prevented
        )
    }
}
