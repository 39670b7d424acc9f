// Allow missing docs for now
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]

//! RGB Shared - deduplicated shared values with deferred command buffers
//!
//! Shared values are stored once per distinct content and referenced by many
//! entities. Changing which value an entity references moves it between
//! slots of a deduplication table, so it must not happen while parallel
//! work is reading that table.
//!
//! # Record now, mutate later
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Phase 1: Producers read the store, record mutations        │
//! │           (one DeferredMutationBuffer per partition)        │
//! │  Phase 2: Barrier                                           │
//! │  Phase 3: Single writer plays back buffers in order         │
//! │  Phase 4: Buffers disposed                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use rgb_shared::{AllocationStrategy, DeferredMutationBuffer, EntityKey, SharedStore};
//!
//! let mut store = SharedStore::new();
//! let mut buffer = DeferredMutationBuffer::new(16, AllocationStrategy::Amortized);
//!
//! buffer.record(EntityKey::new(1), "red")?;
//! buffer.record(EntityKey::new(2), "blue")?;
//! buffer.record(EntityKey::new(1), "green")?;
//!
//! buffer.playback(&mut store)?;
//! buffer.dispose()?;
//!
//! assert_eq!(store.get(EntityKey::new(1)), Some(&"green"));
//! assert_eq!(store.distinct_len(), 2);
//! # Ok::<(), rgb_shared::BufferError>(())
//! ```

mod buffer;
mod clock;
mod error;
pub mod harness;
pub mod index;
mod key;
pub mod parallel;
mod store;
pub mod testing;

pub use buffer::{
    AllocationStrategy, BufferConfig, DeferredMutationBuffer, MIN_CHUNK, PlaybackFailure,
    PlaybackReport,
};
pub use clock::{ClockConfig, SimClock};
pub use error::{BufferError, BufferResult, FlakyStoreError, LookupError};
pub use harness::{SystemContext, TestHarness};
pub use index::{find_slot, find_slot_in};
pub use key::{EntityKey, SlotId};
pub use parallel::{ThreadLocalBuffers, dispose_all, playback_all, record_partitioned};
pub use store::{FallibleKeyedStore, MutableKeyedStore, SharedStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AllocationStrategy, BufferConfig, BufferError, DeferredMutationBuffer, EntityKey,
        MutableKeyedStore, SharedStore, SlotId, find_slot, find_slot_in,
    };
}
