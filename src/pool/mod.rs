//! A concurrent, fixed-capacity pool of uniform slots addressed by
//! self-authenticating [`Handle`]s.
//!
//! Construction errors are a typed [`PoolError`](crate::error::PoolError)
//! `Result`; every runtime operation afterwards returns an in-band
//! sentinel (`Option`/`bool`) rather than an error, by design — see
//! [`crate::error`]. A rejected `release`/`get`/`validate` increments
//! the pool's `anamnesis_count` statistic, its only observable side
//! channel for counterfeit-handle detection.

mod lockfree;
mod stats;

use std::alloc::Layout;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PoolError;
use crate::handle::{self, Handle, SlotState};
use crate::utils::{align_up, is_power_of_two};

pub use stats::{PoolStats, PoolStatsSnapshot};

use lockfree::SlotHeader;

/// Configuration for [`Pool::new`].
///
/// Defaults mirror the reference implementation's `ANAM_POOL_DEFAULT`:
/// 1024 slots of 64 bytes, 8-byte aligned, neither zeroed on alloc nor
/// on release.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Usable bytes per slot, exclusive of the header.
    pub slot_size: usize,
    /// Number of slots the pool holds for its whole lifetime.
    pub slot_count: usize,
    /// Alignment of both the header and the payload within a slot.
    /// Must be a power of two and at least
    /// [`handle::MIN_ALIGNMENT`].
    pub alignment: usize,
    /// Zero a slot's payload on `alloc`, before returning its handle.
    pub zero_on_alloc: bool,
    /// Zero a slot's payload on `release`, before returning it to the
    /// free list.
    pub zero_on_release: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            slot_size: 64,
            slot_count: 1024,
            alignment: 8,
            zero_on_alloc: false,
            zero_on_release: false,
        }
    }
}

impl PoolConfig {
    /// Sets the usable payload size per slot.
    pub fn with_slot_size(mut self, slot_size: usize) -> Self {
        self.slot_size = slot_size;
        self
    }

    /// Sets the fixed number of slots.
    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Sets the slot alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Enables or disables zeroing a slot's payload on `alloc`.
    pub fn with_zero_on_alloc(mut self, zero_on_alloc: bool) -> Self {
        self.zero_on_alloc = zero_on_alloc;
        self
    }

    /// Enables or disables zeroing a slot's payload on `release`.
    pub fn with_zero_on_release(mut self, zero_on_release: bool) -> Self {
        self.zero_on_release = zero_on_release;
        self
    }
}

/// A fixed-capacity pool of uniform slots.
///
/// `Pool` is `Send + Sync`: every field past construction is either
/// immutable or atomic, and the backing buffer is only ever accessed
/// through a validated handle's slot index, never aliased unsoundly
/// across the public API's own type signatures (dereferencing the
/// `NonNull<u8>` `get` returns is on the caller, same as any raw
/// pointer in Rust).
pub struct Pool {
    buffer: NonNull<u8>,
    layout: Layout,
    slot_zero: usize,
    slot_size: usize,
    slot_stride: usize,
    slot_count: usize,
    zero_on_alloc: bool,
    zero_on_release: bool,
    free_head: AtomicU64,
    stats: PoolStats,
}

// Safety: the only raw pointer field, `buffer`, is never mutated after
// construction except through the atomics and pointer arithmetic
// below, all of which is synchronized by the free-list CAS and the
// handle generation check.
unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

impl Pool {
    /// Builds a new pool. Fails if the configuration is invalid or the
    /// backing allocation cannot be made, per
    /// [`PoolError`](crate::error::PoolError).
    pub fn new(config: PoolConfig) -> Result<Pool, PoolError> {
        let PoolConfig {
            slot_size,
            slot_count,
            alignment,
            zero_on_alloc,
            zero_on_release,
        } = config;

        if slot_size == 0 {
            return Err(log_config_error(PoolError::ZeroSlotSize));
        }
        if slot_count == 0 {
            return Err(log_config_error(PoolError::ZeroSlotCount));
        }
        if !is_power_of_two(alignment) {
            return Err(log_config_error(PoolError::AlignmentNotPowerOfTwo(alignment)));
        }
        if alignment < handle::MIN_ALIGNMENT {
            return Err(log_config_error(PoolError::AlignmentTooSmall(alignment)));
        }

        let header_size = mem::size_of::<SlotHeader>();
        let body_size = align_up(slot_size, alignment);
        let slot_stride = align_up(align_up(header_size, alignment) + body_size, 8);

        let total_size = slot_count
            .checked_mul(slot_stride)
            .and_then(|s| s.checked_add(alignment))
            .ok_or_else(|| log_config_error(PoolError::SizeOverflow))?;

        let layout = Layout::from_size_align(total_size, alignment)
            .map_err(|_| log_config_error(PoolError::SizeOverflow))?;

        // Safety: `layout` has a nonzero size, checked above.
        let raw = unsafe { std::alloc::alloc(layout) };
        let buffer = NonNull::new(raw).ok_or_else(|| {
            log_config_error(PoolError::AllocationFailed {
                size: total_size,
                align: alignment,
            })
        })?;

        let slot_zero = align_up(buffer.as_ptr() as usize + header_size, alignment);
        let last_slot_end = slot_zero + (slot_count - 1) * slot_stride + slot_size;
        if last_slot_end as u64 >= (1u64 << 48) {
            // Safety: `buffer`/`layout` were just allocated with this layout.
            unsafe { std::alloc::dealloc(buffer.as_ptr(), layout) };
            return Err(log_config_error(PoolError::AddressSpaceExceeded));
        }

        let pool = Pool {
            buffer,
            layout,
            slot_zero,
            slot_size,
            slot_stride,
            slot_count,
            zero_on_alloc,
            zero_on_release,
            free_head: AtomicU64::new(Handle::NULL.raw()),
            stats: PoolStats::new(slot_count),
        };

        // Safety: every slot index below `slot_count` has a valid,
        // exclusively-owned header address at this point — no other
        // reference to `pool` exists yet.
        unsafe {
            for index in 0..slot_count {
                SlotHeader::init_at(pool.header_ptr(index).cast_mut());
            }
            let mut head = Handle::NULL;
            for index in (0..slot_count).rev() {
                let header = &*pool.header_ptr(index);
                header.next.store(head.raw(), Ordering::Relaxed);
                head = Handle::encode(0, pool.slot_addr(index), SlotState::Free);
            }
            pool.free_head.store(head.raw(), Ordering::Relaxed);
        }

        tracing::debug!(
            slot_size,
            slot_count,
            alignment,
            slot_stride,
            "pool constructed"
        );
        Ok(pool)
    }

    #[inline]
    fn slot_addr(&self, index: usize) -> usize {
        self.slot_zero + index * self.slot_stride
    }

    #[inline]
    fn header_ptr(&self, index: usize) -> *const SlotHeader {
        (self.slot_addr(index) - mem::size_of::<SlotHeader>()) as *const SlotHeader
    }

    #[inline]
    fn payload_ptr(&self, index: usize) -> *mut u8 {
        self.slot_addr(index) as *mut u8
    }

    /// Resolves a handle's claimed address to a slot index, without
    /// checking its generation or state. `None` if the address is not
    /// one this pool could have produced.
    fn index_from_handle(&self, h: Handle) -> Option<usize> {
        let addr = h.addr();
        if addr < self.slot_zero {
            return None;
        }
        let offset = addr - self.slot_zero;
        let index = offset / self.slot_stride;
        if index >= self.slot_count {
            return None;
        }
        #[cfg(feature = "strict-bounds")]
        if offset % self.slot_stride != 0 {
            return None;
        }
        Some(index)
    }

    /// Pops a free slot, bumps the observed `generation_max`, and
    /// returns a `Live` handle with the slot's true generation. `None`
    /// if the pool is exhausted.
    pub fn alloc(&self) -> Option<Handle> {
        let slot = lockfree::pop_free(&self.free_head, |h| {
            self.header_ptr(
                self.index_from_handle(h)
                    .expect("free list handle must resolve to an in-bounds slot index"),
            )
        })?;
        let index = self
            .index_from_handle(slot)
            .expect("handle popped from the free list must be in-bounds");
        // Safety: `index` is in bounds and this slot was just
        // exclusively removed from the free list by the CAS above.
        let header = unsafe { &*self.header_ptr(index) };
        let generation = header.generation.load(Ordering::Acquire) as u16;

        if self.zero_on_alloc {
            // Safety: `index` is in bounds; the payload region is
            // `slot_size` bytes starting at `payload_ptr(index)`.
            unsafe { std::ptr::write_bytes(self.payload_ptr(index), 0, self.slot_size) };
        }

        self.stats.record_alloc();
        self.stats.bump_generation_max(generation);
        Some(Handle::encode(generation, self.slot_addr(index), SlotState::Live))
    }

    /// Releases a previously allocated handle back to the pool.
    ///
    /// Rejects (returning `false` and bumping `anamnesis_count`) a
    /// null handle, a non-`Live` state tag, an out-of-bounds address,
    /// or a generation mismatch against the slot's header — this is
    /// the counterfeit/stale-handle check that makes reuse
    /// ABA-immune.
    pub fn release(&self, handle: Handle) -> bool {
        if handle.is_null() || handle.state() != SlotState::Live {
            self.stats.record_anamnesis();
            return false;
        }
        let Some(index) = self.index_from_handle(handle) else {
            self.stats.record_anamnesis();
            return false;
        };
        // Safety: `index` is in bounds.
        let header = unsafe { &*self.header_ptr(index) };
        let current_generation = header.generation.load(Ordering::Acquire) as u16;
        if current_generation != handle.generation() {
            self.stats.record_anamnesis();
            return false;
        }

        if self.zero_on_release {
            // Safety: `index` is in bounds.
            unsafe { std::ptr::write_bytes(self.payload_ptr(index), 0, self.slot_size) };
        }

        let next_generation = current_generation.wrapping_add(1);
        header
            .generation
            .store(next_generation as u32, Ordering::Release);
        let freed = Handle::encode(next_generation, self.slot_addr(index), SlotState::Free);
        lockfree::push_free(&self.free_head, freed, header);
        self.stats.record_release();
        true
    }

    /// Resolves a handle to its payload, iff it is non-null, `Live`,
    /// in bounds, and its generation matches the slot's current
    /// generation. A rejected call bumps `anamnesis_count`.
    ///
    /// The returned pointer is valid for `slot_size` bytes for as long
    /// as the caller can be sure the slot is not concurrently
    /// released — the pool does not and cannot track that; see the
    /// module docs above.
    pub fn get(&self, handle: Handle) -> Option<NonNull<u8>> {
        if handle.is_null() || handle.state() != SlotState::Live {
            self.stats.record_anamnesis();
            return None;
        }
        let Some(index) = self.index_from_handle(handle) else {
            self.stats.record_anamnesis();
            return None;
        };
        // Safety: `index` is in bounds.
        let header = unsafe { &*self.header_ptr(index) };
        let current_generation = header.generation.load(Ordering::Acquire) as u16;
        if current_generation != handle.generation() {
            self.stats.record_anamnesis();
            return None;
        }
        // Safety: payload pointer for an in-bounds slot is never null.
        Some(unsafe { NonNull::new_unchecked(self.payload_ptr(index)) })
    }

    /// `self.get(handle).is_some()`.
    pub fn validate(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// A snapshot of this pool's counters.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot(self.slot_count)
    }

    /// The fixed slot size this pool was constructed with.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// The fixed slot count this pool was constructed with.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Visits every slot not currently on the free list with its
    /// live handle and payload pointer. The visitor returns `false`
    /// to stop early.
    ///
    /// Not safe to call concurrently with `alloc`/`release` — it walks
    /// the free list to build an "is free" bitmap first and aborts
    /// that walk (rather than looping forever) if it revisits an
    /// index, which indicates a corrupted free list.
    pub fn foreach(&self, mut visitor: impl FnMut(Handle, NonNull<u8>) -> bool) {
        let mut is_free = vec![false; self.slot_count];
        let mut cursor = Handle::from_raw(self.free_head.load(Ordering::Relaxed));
        while !cursor.is_null() {
            let Some(index) = self.index_from_handle(cursor) else {
                tracing::warn!("foreach: free list points outside the slot array, aborting walk");
                return;
            };
            if is_free[index] {
                tracing::warn!(index, "foreach: cycle detected in free list, aborting walk");
                return;
            }
            is_free[index] = true;
            // Safety: `index` is in bounds.
            let header = unsafe { &*self.header_ptr(index) };
            cursor = Handle::from_raw(header.next.load(Ordering::Relaxed));
        }

        for index in 0..self.slot_count {
            if is_free[index] {
                continue;
            }
            // Safety: `index` is in bounds.
            let header = unsafe { &*self.header_ptr(index) };
            let generation = header.generation.load(Ordering::Relaxed) as u16;
            let handle = Handle::encode(generation, self.slot_addr(index), SlotState::Live);
            // Safety: payload pointer for an in-bounds slot is never null.
            let payload = unsafe { NonNull::new_unchecked(self.payload_ptr(index)) };
            if !visitor(handle, payload) {
                return;
            }
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        tracing::debug!(slot_count = self.slot_count, "pool destroyed");
        // Safety: `buffer`/`layout` were allocated together in `new`
        // and never freed elsewhere.
        unsafe { std::alloc::dealloc(self.buffer.as_ptr(), self.layout) };
    }
}

fn log_config_error(err: PoolError) -> PoolError {
    tracing::warn!(error = %err, "pool construction rejected");
    err
}
