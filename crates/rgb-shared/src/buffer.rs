//! Deferred mutation buffer - record now, apply later.
//!
//! While a parallel or read-only phase runs, producers describe
//! "set `target`'s shared value to `value`" without touching the store.
//! Once every producer is done, a single writer replays the log in recording
//! order and then disposes the buffer.
//!
//! ```text
//!   parallel phase                    sequential phase
//! ┌──────────────────────┐        ┌──────────────────────────────┐
//! │ record(e1, red)      │        │ playback(&mut store)         │
//! │ record(e2, blue)     │  ───►  │   set_value(e1, red)         │
//! │ record(e1, green)    │        │   set_value(e2, blue)        │
//! └──────────────────────┘        │   set_value(e1, green)       │
//!                                 │ dispose()                    │
//!                                 └──────────────────────────────┘
//! ```
//!
//! Duplicate targets are kept. Playback reapplies every record in order, so
//! the last record for a key wins.
//!
//! `record` takes `&mut self` and has no internal locking. Use one buffer per
//! partition or per thread (see [`crate::parallel`]) rather than sharing one.

use serde::Deserialize;

use crate::{BufferError, BufferResult, EntityKey, FallibleKeyedStore, MutableKeyedStore};

/// How a buffer grows once its initial capacity is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Geometric growth, amortized O(1) appends.
    #[default]
    Amortized,
    /// Grow in fixed chunks of the initial capacity (at least
    /// [`MIN_CHUNK`] records). Less slack than doubling, still amortized
    /// over the chunk.
    Chunked,
}

/// Smallest step either strategy grows by.
pub const MIN_CHUNK: usize = 64;

/// Construction parameters for a [`DeferredMutationBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Records to reserve up front. A hint, not a bound.
    pub initial_capacity: usize,
    pub strategy: AllocationStrategy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            strategy: AllocationStrategy::Amortized,
        }
    }
}

/// A record that a fallible store refused during [`DeferredMutationBuffer::try_playback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFailure<V, E> {
    pub key: EntityKey,
    pub value: V,
    pub cause: E,
}

/// Outcome of [`DeferredMutationBuffer::try_playback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport<V, E> {
    /// Records the store accepted.
    pub applied: usize,
    /// Records the store refused, in recording order.
    pub failures: Vec<PlaybackFailure<V, E>>,
}

impl<V, E> PlaybackReport<V, E> {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered log of `(target, value)` mutations for shared values.
///
/// `values[i]` applies to `targets[i]`; both vectors always have the same
/// length. The buffer must be released with [`dispose`](Self::dispose)
/// exactly once and is unusable afterwards.
pub struct DeferredMutationBuffer<V> {
    values: Vec<V>,
    targets: Vec<EntityKey>,
    strategy: AllocationStrategy,
    /// Growth step for [`AllocationStrategy::Chunked`].
    chunk: usize,
    disposed: bool,
}

impl<V> DeferredMutationBuffer<V> {
    /// Create an empty buffer.
    ///
    /// No store is needed until playback.
    #[must_use]
    pub fn new(initial_capacity: usize, strategy: AllocationStrategy) -> Self {
        Self {
            values: Vec::with_capacity(initial_capacity),
            targets: Vec::with_capacity(initial_capacity),
            strategy,
            chunk: initial_capacity.max(MIN_CHUNK),
            disposed: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.initial_capacity, config.strategy)
    }

    /// Append a mutation.
    ///
    /// No check against earlier records for the same target.
    pub fn record(&mut self, target: EntityKey, value: V) -> BufferResult<()> {
        self.ensure_live()?;

        // Zero-sized values never fill up, so check both sequences.
        if self.values.len() == self.values.capacity()
            || self.targets.len() == self.targets.capacity()
        {
            self.grow();
        }
        self.values.push(value);
        self.targets.push(target);

        debug_assert_eq!(self.values.len(), self.targets.len());
        Ok(())
    }

    /// Apply every record to `store`, in recording order.
    ///
    /// The caller must make sure nothing else reads or writes the same
    /// targets while this runs. Calling it again reapplies every record.
    pub fn playback<S>(&self, store: &mut S) -> BufferResult<()>
    where
        V: Clone,
        S: MutableKeyedStore<V> + ?Sized,
    {
        self.ensure_live()?;

        for (target, value) in self.iter() {
            tracing::trace!("playback set_value({target})");
            store.set_value(target, value.clone());
        }

        tracing::debug!("played back {} shared-value mutations", self.len());
        Ok(())
    }

    /// Apply every record to a store whose writes may fail.
    ///
    /// A refused record does not stop playback; it is collected in the
    /// report with its cause.
    pub fn try_playback<S>(&self, store: &mut S) -> BufferResult<PlaybackReport<V, S::Error>>
    where
        V: Clone,
        S: FallibleKeyedStore<V> + ?Sized,
    {
        self.ensure_live()?;

        let mut report = PlaybackReport {
            applied: 0,
            failures: Vec::new(),
        };

        for (key, value) in self.iter() {
            match store.try_set_value(key, value.clone()) {
                Ok(()) => report.applied += 1,
                Err(cause) => {
                    tracing::warn!("playback set_value({key}) failed: {cause}");
                    report.failures.push(PlaybackFailure {
                        key,
                        value: value.clone(),
                        cause,
                    });
                }
            }
        }

        tracing::debug!(
            "played back {} shared-value mutations, {} failed",
            report.applied,
            report.failures.len()
        );
        Ok(report)
    }

    /// Release both sequences.
    pub fn dispose(&mut self) -> BufferResult<()> {
        if self.disposed {
            return Err(BufferError::DoubleDispose);
        }

        tracing::trace!("disposing mutation buffer with {} records", self.len());
        self.values = Vec::new();
        self.targets = Vec::new();
        self.disposed = true;
        Ok(())
    }

    /// Dispose a buffer whose producer failed with `cause`, and return `cause`.
    ///
    /// A producer that already disposed the buffer is a second caller bug;
    /// it is logged rather than swallowed.
    pub(crate) fn abandon(&mut self, cause: BufferError) -> BufferError {
        if let Err(err) = self.dispose() {
            tracing::warn!("abandoning mutation buffer after `{cause}`: {err}");
        }
        cause
    }

    /// Iterate `(target, value)` in recording order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (EntityKey, &V)> + '_ {
        self.targets.iter().copied().zip(self.values.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Records that fit before the next reallocation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.capacity().min(self.targets.capacity())
    }

    #[must_use]
    pub const fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    const fn ensure_live(&self) -> BufferResult<()> {
        if self.disposed {
            Err(BufferError::UseAfterDispose)
        } else {
            Ok(())
        }
    }

    /// Reserve the next growth step in both sequences.
    fn grow(&mut self) {
        let additional = match self.strategy {
            AllocationStrategy::Amortized => self.targets.len().max(MIN_CHUNK),
            AllocationStrategy::Chunked => self.chunk,
        };
        self.values.reserve_exact(additional);
        self.targets.reserve_exact(additional);
    }
}

impl<V> Drop for DeferredMutationBuffer<V> {
    fn drop(&mut self) {
        if !self.disposed {
            tracing::warn!(
                "mutation buffer dropped without dispose ({} records)",
                self.values.len()
            );
        }
    }
}

impl<V> std::fmt::Debug for DeferredMutationBuffer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredMutationBuffer")
            .field("len", &self.values.len())
            .field("capacity", &self.capacity())
            .field("strategy", &self.strategy)
            .field("disposed", &self.disposed)
            .finish()
    }
}
