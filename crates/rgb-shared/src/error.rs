//! Error types.

use thiserror::Error;

use crate::EntityKey;

/// Lifetime misuse of a [`DeferredMutationBuffer`](crate::DeferredMutationBuffer).
///
/// Both variants indicate a caller bug rather than a runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// `record` or `playback` called after `dispose`.
    #[error("mutation buffer used after dispose")]
    UseAfterDispose,

    /// `dispose` called more than once.
    #[error("mutation buffer disposed twice")]
    DoubleDispose,
}

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Failure of a singleton lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No key matched.
    #[error("no entity matches")]
    NoMatch,

    /// More than one key matched.
    #[error("expected a single entity, found {count}")]
    Ambiguous { count: usize },
}

/// A store rejected a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlakyStoreError {
    #[error("write rejected for {0}")]
    Rejected(EntityKey),
}
