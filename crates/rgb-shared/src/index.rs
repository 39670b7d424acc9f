//! Shared-value index - map a value back to its deduplicated slot.
//!
//! The store is the source of truth for which distinct values exist and where
//! they live. This module only locates a candidate inside an enumeration the
//! store produced, by value equality.
//!
//! The scratch vectors are owned by the caller so repeated lookups reuse the
//! same allocations:
//!
//! ```ignore
//! let mut values = Vec::new();
//! let mut slots = Vec::new();
//! for color in colors {
//!     if find_slot_in(&store, &color, &mut values, &mut slots).is_none() {
//!         // value not used by any entity yet
//!     }
//! }
//! ```
//!
//! # Staleness
//!
//! A returned [`SlotId`] is a snapshot. The store may compact its table when
//! the last user of some value goes away, after which the same slot can name
//! a different value. Nothing here detects that; re-query before trusting a
//! slot across any store-mutating operation.

use crate::{MutableKeyedStore, SlotId};

/// Find the slot of the first value equal to `candidate`.
///
/// `known_values` and `known_slots` are index-aligned, as filled by
/// [`MutableKeyedStore::list_distinct_values`]. Returns `None` when no equal
/// value exists, which means the store does not use `candidate` right now.
///
/// Runs in O(distinct values).
#[must_use]
pub fn find_slot<V: PartialEq>(
    candidate: &V,
    known_values: &[V],
    known_slots: &[SlotId],
) -> Option<SlotId> {
    debug_assert_eq!(
        known_values.len(),
        known_slots.len(),
        "value and slot enumerations must be index-aligned"
    );

    known_values
        .iter()
        .position(|value| value == candidate)
        .and_then(|i| known_slots.get(i).copied())
}

/// Refresh the scratch enumeration from `store`, then [`find_slot`].
///
/// Any previous contents of `known_values` and `known_slots` are discarded;
/// their capacity is kept.
pub fn find_slot_in<V, S>(
    store: &S,
    candidate: &V,
    known_values: &mut Vec<V>,
    known_slots: &mut Vec<SlotId>,
) -> Option<SlotId>
where
    V: PartialEq,
    S: MutableKeyedStore<V> + ?Sized,
{
    store.list_distinct_values(known_values, known_slots);
    find_slot(candidate, known_values, known_slots)
}
