//! Keys into a shared-value store.
//!
//! An [`EntityKey`] names an addressable entry (an entity) and a [`SlotId`]
//! names one deduplicated value inside the store's shared-value table.

use std::fmt;

/// Stable identifier for an addressable entry in a store.
///
/// Packs an index and a generation, so a recycled index with a newer
/// generation never compares equal to the key it replaced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    index: u32,
    generation: u32,
}

impl EntityKey {
    /// Create a key from an index with generation zero.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            generation: 0,
        }
    }

    /// Create a key from an index and an explicit generation.
    #[must_use]
    pub const fn with_generation(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single u64 (generation in the high half).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Unpack from [`EntityKey::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Identifier of a deduplicated storage slot holding one distinct value.
///
/// A slot id is a snapshot. It stays meaningful only until the store next
/// reorganizes its shared-value table (for example when the last key using
/// some other value is removed). Re-query before trusting a slot across any
/// store mutation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
