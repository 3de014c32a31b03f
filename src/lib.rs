//! # anamnesis
//!
//! A concurrent, fixed-capacity object pool whose handles are
//! self-authenticating: every access can tell whether a handle still
//! designates the object the caller originally received. Built on top
//! of it, a lock-free Michael–Scott MPMC FIFO queue uses the pool's
//! handles as its node links, so every CAS in the queue is ABA-immune
//! for free.
//!
//! ```
//! use anamnesis::{Pool, PoolConfig};
//!
//! let pool = Pool::new(PoolConfig::default().with_slot_count(4)).unwrap();
//! let handle = pool.alloc().unwrap();
//! assert!(pool.validate(handle));
//! assert!(pool.release(handle));
//! assert!(!pool.validate(handle)); // the generation moved on
//! ```

pub mod error;
pub mod handle;
pub mod pool;
pub mod queue;
pub mod utils;

pub use error::{PoolError, QueueError};
pub use handle::{Handle, SlotState};
pub use pool::{Pool, PoolConfig, PoolStats, PoolStatsSnapshot};
pub use queue::{Queue, QueueConfig, QueueStats, QueueStatsSnapshot};
