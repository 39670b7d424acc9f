//! Test harness that drives a fixed list of systems against a store.
//!
//! Each [`TestHarness::step`]:
//!
//! 1. runs every system in registration order with read-only access to the
//!    store, each recording into its own buffer,
//! 2. plays the buffers back in system order,
//! 3. disposes them and advances the clock.
//!
//! Systems therefore observe the store as it was at the start of the step.

use crate::{
    BufferConfig, BufferResult, DeferredMutationBuffer, SharedStore, SimClock,
    parallel::{dispose_all, playback_all},
};

/// What a system may look at while recording.
pub struct SystemContext<'a, V> {
    pub store: &'a SharedStore<V>,
    pub clock: &'a SimClock,
}

type System<V> =
    Box<dyn FnMut(&SystemContext<'_, V>, &mut DeferredMutationBuffer<V>) -> BufferResult<()>>;

pub struct TestHarness<V> {
    store: SharedStore<V>,
    clock: SimClock,
    config: BufferConfig,
    systems: Vec<System<V>>,
}

impl<V: Clone + PartialEq + 'static> Default for TestHarness<V> {
    fn default() -> Self {
        Self::new(SimClock::default(), BufferConfig::default())
    }
}

impl<V: Clone + PartialEq + 'static> TestHarness<V> {
    #[must_use]
    pub fn new(clock: SimClock, config: BufferConfig) -> Self {
        Self {
            store: SharedStore::new(),
            clock,
            config,
            systems: Vec::new(),
        }
    }

    /// Append a system. Systems run in the order they were added.
    pub fn add_system<F>(&mut self, system: F) -> &mut Self
    where
        F: FnMut(&SystemContext<'_, V>, &mut DeferredMutationBuffer<V>) -> BufferResult<()>
            + 'static,
    {
        self.systems.push(Box::new(system));
        self
    }

    /// Run one step. Returns the number of mutations applied.
    ///
    /// A failing step applies nothing: the store is left as it was and the
    /// clock does not advance. All of the step's buffers are disposed either
    /// way.
    pub fn step(&mut self) -> BufferResult<usize> {
        let mut buffers = Vec::with_capacity(self.systems.len());
        let ctx = SystemContext {
            store: &self.store,
            clock: &self.clock,
        };

        for system in &mut self.systems {
            let mut buffer = DeferredMutationBuffer::from_config(&self.config);
            if let Err(err) = system(&ctx, &mut buffer) {
                let err = buffer.abandon(err);
                if let Err(dispose_err) = dispose_all(&mut buffers) {
                    tracing::warn!("releasing buffers after failed system: {dispose_err}");
                }
                return Err(err);
            }
            buffers.push(buffer);
        }

        let applied: usize = buffers.iter().map(DeferredMutationBuffer::len).sum();
        let played = playback_all(&buffers, &mut self.store);
        let disposed = dispose_all(&mut buffers);
        played?;
        disposed?;

        self.clock.advance();
        tracing::debug!(
            "harness tick {} applied {applied} mutations",
            self.clock.tick()
        );
        Ok(applied)
    }

    /// Run `steps` steps, stopping at the first error.
    pub fn run(&mut self, steps: usize) -> BufferResult<usize> {
        let mut applied = 0;
        for _ in 0..steps {
            applied += self.step()?;
        }
        Ok(applied)
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore<V> {
        &self.store
    }

    /// Direct store access for seeding state between steps.
    pub fn store_mut(&mut self) -> &mut SharedStore<V> {
        &mut self.store
    }

    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferError, EntityKey, MutableKeyedStore};

    const E1: EntityKey = EntityKey::new(1);
    const E2: EntityKey = EntityKey::new(2);

    #[test]
    fn test_systems_apply_in_order() {
        let mut harness = TestHarness::default();
        harness
            .add_system(|_, buffer| buffer.record(E1, "red"))
            .add_system(|_, buffer| buffer.record(E1, "blue"));

        assert_eq!(harness.step().unwrap(), 2);
        assert_eq!(harness.store().get(E1), Some(&"blue"));
        assert_eq!(harness.clock().tick(), 1);
    }

    #[test]
    fn test_systems_see_start_of_step_state() {
        let mut harness = TestHarness::default();
        harness.store_mut().set_value(E1, 0u64);

        // Writes the tick into E1, and copies E1 into E2.
        harness
            .add_system(|ctx, buffer| buffer.record(E1, ctx.clock.tick() + 1))
            .add_system(|ctx, buffer| match ctx.store.get(E1) {
                Some(&value) => buffer.record(E2, value),
                None => Ok(()),
            });

        harness.run(3).unwrap();

        assert_eq!(harness.store().get(E1), Some(&3));
        // E2 lags one step behind E1.
        assert_eq!(harness.store().get(E2), Some(&2));
        assert_eq!(harness.clock().tick(), 3);
    }

    #[test]
    fn test_failed_system_leaves_store_untouched() {
        let mut harness = TestHarness::default();
        harness
            .add_system(|_, buffer| buffer.record(E1, "red"))
            .add_system(|_, buffer| {
                buffer.record(E2, "blue")?;
                buffer.dispose()?;
                buffer.record(E2, "green")
            });

        assert_eq!(harness.step(), Err(BufferError::UseAfterDispose));
        assert!(harness.store().is_empty());
        assert_eq!(harness.clock().tick(), 0);
    }

    #[test]
    fn test_system_disposing_own_buffer_applies_nothing() {
        let mut harness = TestHarness::default();
        harness
            .add_system(|_, buffer| buffer.record(E1, "red"))
            .add_system(|_, buffer| {
                buffer.record(E2, "blue")?;
                buffer.dispose()
            });

        // The second system reports success, but its buffer is already gone.
        assert_eq!(harness.step(), Err(BufferError::UseAfterDispose));
        assert!(harness.store().is_empty());
        assert_eq!(harness.clock().tick(), 0);
    }

    #[test]
    fn test_empty_harness_advances_clock() {
        let mut harness: TestHarness<u8> = TestHarness::default();
        assert_eq!(harness.run(2).unwrap(), 0);
        assert_eq!(harness.clock().tick(), 2);
        assert!(harness.store().is_empty());
    }
}
