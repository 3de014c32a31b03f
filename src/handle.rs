//! The self-authenticating handle.
//!
//! A [`Handle`] is a 64-bit opaque value packing three fields:
//!
//! ```text
//! bit   63            48 47                          3 2     0
//!       +---------------+-----------------------------+-------+
//!       |  generation   |            address           | state |
//!       +---------------+-----------------------------+-------+
//! ```
//!
//! `generation` is a 16-bit incarnation counter, `address` is the
//! target slot's pointer with its low 3 bits (always zero, because
//! every slot is at least 8-byte aligned) dropped, and `state` is a
//! 3-bit lifecycle tag. The all-zero handle is `NULL` and never
//! denotes a slot.
//!
//! Generation arithmetic wraps modulo 2^16. A handle captured, then
//! made stale by exactly 65536 releases of the same slot, re-validates
//! by coincidence — the same horizon the reference implementation
//! documents and accepts as negligible for the intended workloads.
//! This is not defended against; it is the stated collision horizon of
//! the scheme (see `SPEC_FULL.md` §3.1).

use core::fmt;

const GENERATION_SHIFT: u32 = 48;
const ADDR_MASK: u64 = 0x0000_FFFF_FFFF_FFF8;
const STATE_MASK: u64 = 0x7;

/// Minimum alignment a pool's slots may use; the handle's state tag
/// occupies the low 3 bits of every slot address.
pub const MIN_ALIGNMENT: usize = 8;

/// Lifecycle tag packed into a handle's low 3 bits.
///
/// `Quarantine` and `Locked` are reserved encodings for future
/// deferred-reclamation schemes; this crate's `alloc` never produces
/// them, but `Handle::state` must still be able to report them if a
/// caller round-trips a raw `u64` that wasn't minted by this pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SlotState {
    /// Slot is on the free list, available for allocation.
    Free = 0,
    /// Slot is allocated and in use.
    Live = 1,
    /// Reserved: pending deferred reclamation. Never produced here.
    Quarantine = 2,
    /// Reserved: CAS lock bit. Never produced here.
    Locked = 4,
    /// Bit pattern did not match any known state (e.g. `3`, `5`, `6`,
    /// `7` — combinations of the reserved bits). Always treated as
    /// invalid by `Pool`/`Queue` validation.
    Unknown(u8),
}

impl SlotState {
    #[inline]
    const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => SlotState::Free,
            1 => SlotState::Live,
            2 => SlotState::Quarantine,
            4 => SlotState::Locked,
            other => SlotState::Unknown(other),
        }
    }

    #[inline]
    const fn to_bits(self) -> u8 {
        match self {
            SlotState::Free => 0,
            SlotState::Live => 1,
            SlotState::Quarantine => 2,
            SlotState::Locked => 4,
            SlotState::Unknown(bits) => bits,
        }
    }
}

/// An opaque, self-authenticating 64-bit reference to a pool slot.
///
/// `Handle` is the only identity that crosses the pool's and the
/// queue's public API boundary; raw pointers are never returned except
/// by [`crate::pool::Pool::get`], and then only after the handle has
/// been revalidated against the slot's true generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// The null handle. Never denotes a slot.
    pub const NULL: Handle = Handle(0);

    /// Packs a generation, slot address, and state into a handle.
    ///
    /// `addr`'s low 3 bits are discarded, not checked — callers are
    /// expected to pass slot-aligned addresses; see
    /// [`crate::pool::Pool`] for where that's enforced.
    #[inline]
    pub(crate) const fn encode(generation: u16, addr: usize, state: SlotState) -> Handle {
        let packed = ((generation as u64) << GENERATION_SHIFT)
            | (addr as u64 & ADDR_MASK)
            | (state.to_bits() as u64 & STATE_MASK);
        Handle(packed)
    }

    /// The raw 64-bit encoding.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Reconstructs a handle from a raw 64-bit encoding, e.g. one
    /// previously obtained from [`Handle::raw`] and stored elsewhere.
    #[inline]
    pub const fn from_raw(raw: u64) -> Handle {
        Handle(raw)
    }

    /// `true` iff this is the null handle.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The generation this handle claims. Whether the pool agrees is
    /// a separate question, answered by [`crate::pool::Pool::get`].
    #[inline]
    pub const fn generation(self) -> u16 {
        (self.0 >> GENERATION_SHIFT) as u16
    }

    /// The lifecycle state this handle claims.
    #[inline]
    pub const fn state(self) -> SlotState {
        SlotState::from_bits((self.0 & STATE_MASK) as u8)
    }

    #[inline]
    pub(crate) const fn addr(self) -> usize {
        (self.0 & ADDR_MASK) as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Handle(NULL)");
        }
        f.debug_struct("Handle")
            .field("generation", &self.generation())
            .field("state", &self.state())
            .field("raw", &format_args!("{:#018x}", self.0))
            .finish()
    }
}
