//! Instrumented stores for exercising buffers in tests.

use rustc_hash::FxHashSet;

use crate::{
    EntityKey, FallibleKeyedStore, FlakyStoreError, MutableKeyedStore, SharedStore, SlotId,
};

/// A [`SharedStore`] that logs every `set_value` call in order.
pub struct RecordingStore<V> {
    inner: SharedStore<V>,
    calls: Vec<(EntityKey, V)>,
}

impl<V> Default for RecordingStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RecordingStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SharedStore::new(),
            calls: Vec::new(),
        }
    }

    /// Calls received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[(EntityKey, V)] {
        &self.calls
    }

    #[must_use]
    pub fn inner(&self) -> &SharedStore<V> {
        &self.inner
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl<V: Clone + PartialEq> MutableKeyedStore<V> for RecordingStore<V> {
    fn set_value(&mut self, key: EntityKey, value: V) {
        self.calls.push((key, value.clone()));
        self.inner.set_value(key, value);
    }

    fn list_distinct_values(&self, out_values: &mut Vec<V>, out_slots: &mut Vec<SlotId>) {
        self.inner.list_distinct_values(out_values, out_slots);
    }
}

/// A [`SharedStore`] that refuses writes to selected keys.
pub struct FlakyStore<V> {
    inner: SharedStore<V>,
    rejected: FxHashSet<EntityKey>,
}

impl<V> Default for FlakyStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FlakyStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SharedStore::new(),
            rejected: FxHashSet::default(),
        }
    }

    /// Refuse every future write to `key`.
    pub fn reject(&mut self, key: EntityKey) {
        self.rejected.insert(key);
    }

    #[must_use]
    pub fn inner(&self) -> &SharedStore<V> {
        &self.inner
    }
}

impl<V: Clone + PartialEq> FallibleKeyedStore<V> for FlakyStore<V> {
    type Error = FlakyStoreError;

    fn try_set_value(&mut self, key: EntityKey, value: V) -> Result<(), Self::Error> {
        if self.rejected.contains(&key) {
            return Err(FlakyStoreError::Rejected(key));
        }
        self.inner.set_value(key, value);
        Ok(())
    }
}
