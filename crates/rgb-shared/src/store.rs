//! Store contract and an in-memory deduplicating store.
//!
//! Buffers never own a store. They only borrow one through
//! [`MutableKeyedStore`] (or [`FallibleKeyedStore`]) while playing back.
//!
//! [`SharedStore`] keeps every distinct value once, in a slot, and maps each
//! key to the slot of its value:
//!
//! ```text
//! keys:   e1 ──┐     e2 ──┐    e3 ──┐
//!              ▼          ▼         │
//! slots:  [0] "red"   [1] "blue" ◄──┘
//! ```
//!
//! When a slot loses its last key it is removed with `swap_remove`, so the
//! last slot moves into the hole. Slot ids observed before that are stale.

use std::convert::Infallible;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{EntityKey, LookupError, SlotId};

/// A keyed store holding shared, deduplicated values.
pub trait MutableKeyedStore<V> {
    /// Assign `value` as the shared value of `key`.
    ///
    /// May be called any number of times for the same key; each call simply
    /// re-slots it.
    fn set_value(&mut self, key: EntityKey, value: V);

    /// Enumerate every distinct value and its slot, index-aligned.
    ///
    /// Both vectors are cleared first.
    fn list_distinct_values(&self, out_values: &mut Vec<V>, out_slots: &mut Vec<SlotId>);
}

/// A keyed store whose writes can fail per key.
pub trait FallibleKeyedStore<V> {
    type Error: std::error::Error;

    fn try_set_value(&mut self, key: EntityKey, value: V) -> Result<(), Self::Error>;
}

/// One distinct value and the keys sharing it.
struct SharedSlot<V> {
    value: V,
    keys: SmallVec<[EntityKey; 4]>,
}

/// In-memory store with a deduplicated shared-value table.
pub struct SharedStore<V> {
    /// Distinct values, indexed by `SlotId`.
    slots: Vec<SharedSlot<V>>,
    /// Key -> slot of its current value.
    keys: FxHashMap<EntityKey, SlotId>,
}

impl<V> Default for SharedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SharedStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            keys: FxHashMap::default(),
        }
    }

    /// Create a store with room for `key_capacity` keys.
    #[must_use]
    pub fn with_capacity(key_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            keys: FxHashMap::with_capacity_and_hasher(key_capacity, Default::default()),
        }
    }

    // ==================== Lookups ====================

    /// Current value of `key`.
    #[must_use]
    pub fn get(&self, key: EntityKey) -> Option<&V> {
        let slot = self.keys.get(&key)?;
        Some(&self.slots[slot.index()].value)
    }

    /// Current slot of `key`. See [`SlotId`] for staleness.
    #[must_use]
    pub fn slot_of(&self, key: EntityKey) -> Option<SlotId> {
        self.keys.get(&key).copied()
    }

    /// Value stored in `slot`, if the slot exists.
    #[must_use]
    pub fn value_at(&self, slot: SlotId) -> Option<&V> {
        self.slots.get(slot.index()).map(|s| &s.value)
    }

    #[must_use]
    pub fn contains(&self, key: EntityKey) -> bool {
        self.keys.contains_key(&key)
    }

    // ==================== Counts ====================

    /// Number of keys holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of distinct values (occupied slots).
    #[must_use]
    pub fn distinct_len(&self) -> usize {
        self.slots.len()
    }

    /// Iterate all `(key, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &V)> + '_ {
        self.keys
            .iter()
            .map(|(&key, slot)| (key, &self.slots[slot.index()].value))
    }

    /// Remove `key`, returning the value it held.
    pub fn remove(&mut self, key: EntityKey) -> Option<V>
    where
        V: Clone,
    {
        let slot = self.keys.remove(&key)?;
        let value = self.slots[slot.index()].value.clone();
        self.detach(key, slot);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.keys.clear();
    }

    /// Drop `key` from `slot`, compacting the table if the slot empties.
    ///
    /// Does not touch `self.keys[key]`; callers overwrite or remove it.
    fn detach(&mut self, key: EntityKey, slot: SlotId) {
        let index = slot.index();
        let users = &mut self.slots[index].keys;
        if let Some(pos) = users.iter().position(|&k| k == key) {
            users.swap_remove(pos);
        }
        if !users.is_empty() {
            return;
        }

        self.slots.swap_remove(index);
        if index < self.slots.len() {
            // The former last slot now lives at `index`.
            for &moved in &self.slots[index].keys {
                self.keys.insert(moved, slot);
            }
            tracing::trace!(
                "compacted shared slot {slot}, moved slot {}",
                self.slots.len()
            );
        }
    }
}

impl<V: PartialEq> SharedStore<V> {
    /// Keys currently sharing `value`.
    #[must_use]
    pub fn keys_with(&self, value: &V) -> &[EntityKey] {
        self.slots
            .iter()
            .find(|s| &s.value == value)
            .map(|s| s.keys.as_slice())
            .unwrap_or_default()
    }

    /// Number of keys currently sharing `value`.
    #[must_use]
    pub fn count_with(&self, value: &V) -> usize {
        self.keys_with(value).len()
    }

    /// The only key holding `value`.
    pub fn single_with(&self, value: &V) -> Result<EntityKey, LookupError> {
        match self.keys_with(value) {
            [] => Err(LookupError::NoMatch),
            [key] => Ok(*key),
            keys => Err(LookupError::Ambiguous { count: keys.len() }),
        }
    }

    /// The only key in the store and its value.
    pub fn single(&self) -> Result<(EntityKey, &V), LookupError> {
        match self.keys.len() {
            0 => Err(LookupError::NoMatch),
            1 => self.iter().next().ok_or(LookupError::NoMatch),
            count => Err(LookupError::Ambiguous { count }),
        }
    }
}

impl<V: Clone + PartialEq> MutableKeyedStore<V> for SharedStore<V> {
    fn set_value(&mut self, key: EntityKey, value: V) {
        if let Some(&current) = self.keys.get(&key) {
            if self.slots[current.index()].value == value {
                return;
            }
            self.detach(key, current);
        }

        let slot = match self.slots.iter().position(|s| s.value == value) {
            Some(index) => SlotId::from_raw(index as u32),
            None => {
                self.slots.push(SharedSlot {
                    value,
                    keys: SmallVec::new(),
                });
                SlotId::from_raw((self.slots.len() - 1) as u32)
            }
        };

        self.slots[slot.index()].keys.push(key);
        self.keys.insert(key, slot);
    }

    fn list_distinct_values(&self, out_values: &mut Vec<V>, out_slots: &mut Vec<SlotId>) {
        out_values.clear();
        out_slots.clear();
        out_values.reserve(self.slots.len());
        out_slots.reserve(self.slots.len());

        for (index, slot) in self.slots.iter().enumerate() {
            out_values.push(slot.value.clone());
            out_slots.push(SlotId::from_raw(index as u32));
        }
    }
}

impl<V: Clone + PartialEq> FallibleKeyedStore<V> for SharedStore<V> {
    type Error = Infallible;

    fn try_set_value(&mut self, key: EntityKey, value: V) -> Result<(), Self::Error> {
        self.set_value(key, value);
        Ok(())
    }
}

impl<V> std::fmt::Debug for SharedStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("keys", &self.keys.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E1: EntityKey = EntityKey::new(1);
    const E2: EntityKey = EntityKey::new(2);
    const E3: EntityKey = EntityKey::new(3);

    #[test]
    fn test_equal_values_share_a_slot() {
        let mut store = SharedStore::new();
        store.set_value(E1, "red");
        store.set_value(E2, "red");
        store.set_value(E3, "blue");

        assert_eq!(store.len(), 3);
        assert_eq!(store.distinct_len(), 2);
        assert_eq!(store.slot_of(E1), store.slot_of(E2));
        assert_ne!(store.slot_of(E1), store.slot_of(E3));
    }

    #[test]
    fn test_reslot_key() {
        let mut store = SharedStore::new();
        store.set_value(E1, 1);
        store.set_value(E1, 1);
        assert_eq!(store.distinct_len(), 1);

        store.set_value(E1, 2);
        assert_eq!(store.get(E1), Some(&2));
        assert_eq!(store.distinct_len(), 1);
        assert_eq!(store.count_with(&1), 0);
    }

    #[test]
    fn test_compaction_makes_slots_stale() {
        let mut store = SharedStore::new();
        store.set_value(E1, "a");
        store.set_value(E2, "b");
        store.set_value(E3, "c");

        let slot_c = store.slot_of(E3).unwrap();
        assert_eq!(store.value_at(slot_c), Some(&"c"));

        // Last user of "a" leaves; "c" moves into slot 0.
        assert_eq!(store.remove(E1), Some("a"));
        assert_eq!(store.distinct_len(), 2);
        assert_eq!(store.value_at(slot_c), None);
        assert_eq!(store.get(E3), Some(&"c"));

        let fresh = store.slot_of(E3).unwrap();
        assert_eq!(store.value_at(fresh), Some(&"c"));
        assert_eq!(fresh, SlotId::from_raw(0));
    }

    #[test]
    fn test_list_distinct_values_clears_output() {
        let mut store = SharedStore::new();
        store.set_value(E1, 10);
        store.set_value(E2, 20);

        let mut values = vec![0; 5];
        let mut slots = vec![SlotId::from_raw(42)];
        store.list_distinct_values(&mut values, &mut slots);

        assert_eq!(values, vec![10, 20]);
        assert_eq!(slots, vec![SlotId::from_raw(0), SlotId::from_raw(1)]);
    }

    #[test]
    fn test_counts_and_singletons() {
        let mut store = SharedStore::new();
        assert_eq!(store.single(), Err(LookupError::NoMatch));

        store.set_value(E1, "config");
        assert_eq!(store.single(), Ok((E1, &"config")));

        store.set_value(E2, "player");
        store.set_value(E3, "player");

        assert_eq!(store.count_with(&"player"), 2);
        assert_eq!(store.single_with(&"config"), Ok(E1));
        assert_eq!(store.single_with(&"missing"), Err(LookupError::NoMatch));
        assert_eq!(
            store.single_with(&"player"),
            Err(LookupError::Ambiguous { count: 2 })
        );
        assert_eq!(store.single(), Err(LookupError::Ambiguous { count: 3 }));
    }

    #[test]
    fn test_remove_missing_key() {
        let mut store: SharedStore<u8> = SharedStore::with_capacity(4);
        assert_eq!(store.remove(E1), None);
        assert!(store.is_empty());
    }
}
