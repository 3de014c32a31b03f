//! Configuration error types for the pool and the queue.
//!
//! Every *runtime* failure mode (exhaustion, counterfeit handle, empty
//! queue) is an in-band sentinel — `Option`/`bool` — by design, not an
//! oversight: see the module docs on [`crate::pool`] and [`crate::queue`].
//! Only construction-time misconfiguration gets a typed error, because a
//! constructor that silently returns null is a worse API than a `Result`.

/// Errors returned by [`crate::pool::Pool::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// `slot_size` was zero.
    #[error("slot_size must be greater than zero")]
    ZeroSlotSize,

    /// `slot_count` was zero.
    #[error("slot_count must be greater than zero")]
    ZeroSlotCount,

    /// `alignment` was not a power of two.
    #[error("alignment {0} is not a power of two")]
    AlignmentNotPowerOfTwo(usize),

    /// `alignment` was below the minimum required to steal 3 low bits
    /// for the handle's state tag.
    #[error("alignment {0} is below the minimum of 8 bytes")]
    AlignmentTooSmall(usize),

    /// The computed slot layout would put some slot's address outside
    /// the handle's 45-bit address field.
    #[error("pool memory region does not fit in a 45-bit handle address field")]
    AddressSpaceExceeded,

    /// `slot_stride * slot_count` overflowed `usize`.
    #[error("pool size overflows usize")]
    SizeOverflow,

    /// The backing allocation failed.
    #[error("failed to allocate {size} bytes aligned to {align}")]
    AllocationFailed {
        /// Requested allocation size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },
}

/// Errors returned by [`crate::queue::Queue::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// `item_size` was zero.
    #[error("item_size must be greater than zero")]
    ZeroItemSize,

    /// `capacity` was zero.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// The queue's backing pool (sized `capacity + 1`) failed to
    /// construct.
    #[error("failed to construct backing pool: {0}")]
    Pool(#[from] PoolError),

    /// Allocating the permanent dummy node failed even though the
    /// backing pool was just constructed with spare capacity for it —
    /// indicates the freshly constructed pool reported itself
    /// exhausted immediately, which would itself be a bug; surfaced
    /// defensively rather than panicking.
    #[error("failed to allocate the queue's dummy node")]
    DummyAllocationFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_error_messages_are_stable() {
        assert_eq!(
            PoolError::ZeroSlotSize.to_string(),
            "slot_size must be greater than zero"
        );
        assert_eq!(
            PoolError::AlignmentNotPowerOfTwo(3).to_string(),
            "alignment 3 is not a power of two"
        );
    }

    #[test]
    fn queue_error_wraps_pool_error() {
        let err = QueueError::from(PoolError::ZeroSlotCount);
        assert!(matches!(err, QueueError::Pool(PoolError::ZeroSlotCount)));
        assert!(err.to_string().contains("slot_count"));
    }
}
