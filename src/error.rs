use thiserror::Error;

/// The shared outcome of a single-flight computation.
///
/// Every caller for a key receives a clone of the same outcome.
pub type Outcome<V, E> = Result<V, Error<E>>;

/// Why an evaluation did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    /// The computation itself failed.
    ///
    /// This is recorded permanently for the key. Later calls observe the same
    /// failure instead of retrying.
    #[error("computation failed: {0}")]
    Computation(E),
    /// The computing caller panicked before producing an outcome.
    ///
    /// Recorded permanently, like a computation failure.
    #[error("computation panicked")]
    Panicked,
    /// A waiting caller gave up before the outcome arrived.
    ///
    /// Only seen by the caller that timed out. The computation carries on and
    /// later calls observe its outcome.
    #[error("timed out while waiting for a concurrent computation")]
    TimedOut,
    /// The current thread is already computing this key.
    ///
    /// Waiting would deadlock, so the call fails fast. Not recorded.
    #[error("re-entrant evaluation of a key that is being computed on this thread")]
    Reentrant,
}

impl<E> Error<E> {
    /// The computation's own error, if that is what happened.
    pub fn computation(&self) -> Option<&E> {
        match self {
            Self::Computation(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this error was recorded in the cache for the key.
    ///
    /// Timeouts and re-entrant calls are local to one caller.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Computation(_) | Self::Panicked)
    }
}
