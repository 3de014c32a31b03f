//! The free list: a Treiber stack of slot handles.
//!
//! ABA on the free list itself is a non-issue by construction: the
//! link between free slots is a [`Handle`], carrying a generation, not
//! a bare address. Two different incarnations of the same physical
//! slot produce two different link values, so a thread that read the
//! free-list head before a pop-then-push-of-the-same-slot race cannot
//! mistake the new incarnation for the old one during its CAS.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::handle::Handle;
use crate::utils::Backoff;

/// Per-slot header: the free-list link and the slot's true generation.
///
/// `next` is meaningful only while the slot is free. `generation` is
/// the pool's source of truth that a handle's claimed generation is
/// checked against on every `get`/`release`/`validate`.
#[repr(C)]
pub(crate) struct SlotHeader {
    pub(crate) next: AtomicU64,
    pub(crate) generation: AtomicU32,
}

impl SlotHeader {
    /// Writes a fresh header (generation 0, no link) at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for writes and not yet have a live
    /// `SlotHeader` at that address (this overwrites, it does not drop).
    pub(crate) unsafe fn init_at(ptr: *mut SlotHeader) {
        ptr.write(SlotHeader {
            next: AtomicU64::new(Handle::NULL.raw()),
            generation: AtomicU32::new(0),
        });
    }
}

/// Pops a slot off the free-list Treiber stack.
///
/// `header_of` resolves a handle already known to be on the free list
/// to its header; it must not panic for any handle reachable from
/// `free_head`, i.e. every handle this function observes in `next`
/// fields must already be a valid in-bounds slot link.
///
/// Returns `None` once the list is observed empty; under sustained
/// contention from concurrent pushes the CAS may retry indefinitely,
/// same as the reference implementation's bare spin loop, mitigated
/// here by [`Backoff`].
pub(crate) fn pop_free(
    free_head: &AtomicU64,
    header_of: impl Fn(Handle) -> *const SlotHeader,
) -> Option<Handle> {
    let mut backoff = Backoff::new();
    loop {
        let head_raw = free_head.load(Ordering::Acquire);
        let head = Handle::from_raw(head_raw);
        if head.is_null() {
            return None;
        }
        // Safety: `head` came from `free_head`, so by the contract
        // above `header_of(head)` is a valid pointer.
        let header = unsafe { &*header_of(head) };
        let next = header.next.load(Ordering::Relaxed);
        match free_head.compare_exchange_weak(
            head_raw,
            next,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Some(head),
            Err(_) => backoff.spin(),
        }
    }
}

/// Pushes a slot back onto the free-list Treiber stack.
///
/// `header` must be the header belonging to `slot`; the caller has
/// already bumped its generation and cleared its live state before
/// this call, so publishing `slot` here is the linearization point at
/// which concurrent `alloc`s may observe and reuse it.
pub(crate) fn push_free(free_head: &AtomicU64, slot: Handle, header: &SlotHeader) {
    let mut backoff = Backoff::new();
    let mut head_raw = free_head.load(Ordering::Relaxed);
    loop {
        header.next.store(head_raw, Ordering::Relaxed);
        match free_head.compare_exchange_weak(
            head_raw,
            slot.raw(),
            Ordering::Release,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(observed) => {
                head_raw = observed;
                backoff.spin();
            }
        }
    }
}
