//! Recording from many producers at once.
//!
//! A [`DeferredMutationBuffer`] has no internal locking, so concurrent
//! producers each get their own buffer:
//!
//! - [`record_partitioned`] splits the input into partitions on the rayon
//!   pool and returns one buffer per partition, in partition order. Playing
//!   them back with [`playback_all`] is deterministic.
//! - [`ThreadLocalBuffers`] hands every worker thread its own buffer on first
//!   use. Order within a thread is preserved; order across threads is not.

use core::cell::RefCell;

use rayon::prelude::*;
use thread_local::ThreadLocal;

use crate::{
    BufferConfig, BufferError, BufferResult, DeferredMutationBuffer, EntityKey, MutableKeyedStore,
};

/// Run `produce` over `items` in parallel, one buffer per partition.
///
/// Buffers come back in partition order regardless of which thread filled
/// them. A `partition_len` of zero is treated as one.
///
/// If any partition fails, every buffer is disposed and the error of the
/// first failing partition is returned.
pub fn record_partitioned<T, V, F>(
    items: &[T],
    partition_len: usize,
    config: &BufferConfig,
    produce: F,
) -> BufferResult<Vec<DeferredMutationBuffer<V>>>
where
    T: Sync,
    V: Send,
    F: Fn(&T, &mut DeferredMutationBuffer<V>) -> BufferResult<()> + Sync,
{
    let mut partitions: Vec<BufferResult<DeferredMutationBuffer<V>>> = items
        .par_chunks(partition_len.max(1))
        .map(|partition| {
            let mut buffer = DeferredMutationBuffer::from_config(config);
            for item in partition {
                if let Err(err) = produce(item, &mut buffer) {
                    return Err(buffer.abandon(err));
                }
            }
            Ok(buffer)
        })
        .collect();

    release_on_failure(&mut partitions)?;
    Ok(partitions.into_iter().filter_map(Result::ok).collect())
}

/// If any partition failed, dispose the buffers of the others in place and
/// return the first failure.
fn release_on_failure<V>(
    partitions: &mut [BufferResult<DeferredMutationBuffer<V>>],
) -> BufferResult<()> {
    let Some(err) = partitions.iter().find_map(|p| p.as_ref().err().copied()) else {
        return Ok(());
    };

    for buffer in partitions.iter_mut().filter_map(|p| p.as_mut().ok()) {
        if let Err(dispose_err) = buffer.dispose() {
            tracing::warn!("releasing partition buffer: {dispose_err}");
        }
    }
    Err(err)
}

/// Play back `buffers` one after another, in slice order.
///
/// Fails with `UseAfterDispose` before touching the store if any buffer has
/// been disposed, so the store is never left partially updated.
pub fn playback_all<V, S>(buffers: &[DeferredMutationBuffer<V>], store: &mut S) -> BufferResult<()>
where
    V: Clone,
    S: MutableKeyedStore<V> + ?Sized,
{
    if buffers.iter().any(DeferredMutationBuffer::is_disposed) {
        return Err(BufferError::UseAfterDispose);
    }

    for buffer in buffers {
        buffer.playback(store)?;
    }
    Ok(())
}

/// Dispose every buffer, reporting the first error after trying them all.
pub fn dispose_all<V>(buffers: &mut [DeferredMutationBuffer<V>]) -> BufferResult<()> {
    let mut result = Ok(());
    for buffer in buffers {
        if let Err(err) = buffer.dispose() {
            result = result.and(Err(err));
        }
    }
    result
}

/// Per-thread mutation buffers.
///
/// Each thread gets its own buffer the first time it records. After the
/// parallel work completes, the owner drains or plays back all of them.
pub struct ThreadLocalBuffers<V: Send> {
    inner: ThreadLocal<RefCell<DeferredMutationBuffer<V>>>,
    config: BufferConfig,
}

impl<V: Send> ThreadLocalBuffers<V> {
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            inner: ThreadLocal::new(),
            config,
        }
    }

    /// The current thread's buffer, created on first access.
    pub fn current(&self) -> &RefCell<DeferredMutationBuffer<V>> {
        self.inner
            .get_or(|| RefCell::new(DeferredMutationBuffer::from_config(&self.config)))
    }

    /// Record into the current thread's buffer.
    pub fn record(&self, target: EntityKey, value: V) -> BufferResult<()> {
        self.current().borrow_mut().record(target, value)
    }

    /// Total records across all threads.
    ///
    /// Requires `&mut self` so no thread is still recording.
    pub fn pending(&mut self) -> usize {
        self.inner.iter_mut().map(|cell| cell.get_mut().len()).sum()
    }

    /// Take every thread's buffer, leaving this collection empty.
    ///
    /// The caller becomes responsible for playing back and disposing them.
    pub fn drain(&mut self) -> Vec<DeferredMutationBuffer<V>> {
        core::mem::take(&mut self.inner)
            .into_iter()
            .map(RefCell::into_inner)
            .collect()
    }

    /// Drain, play back and dispose every thread's buffer.
    ///
    /// Returns the number of records applied.
    pub fn playback<S>(&mut self, store: &mut S) -> BufferResult<usize>
    where
        V: Clone,
        S: MutableKeyedStore<V> + ?Sized,
    {
        let mut buffers = self.drain();
        let applied: usize = buffers.iter().map(DeferredMutationBuffer::len).sum();

        let played = playback_all(&buffers, store);
        dispose_all(&mut buffers)?;
        played?;

        Ok(applied)
    }
}

impl<V: Send> Default for ThreadLocalBuffers<V> {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}
