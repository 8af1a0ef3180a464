use std::thread::ThreadId;

use crate::error::Outcome;
use crate::notify::Notifier;

/// The cache entry for a single key.
///
/// A slot is created in the `Computing` state the instant its key is first
/// requested, transitions to `Resolved` exactly once and is never removed.
pub enum Slot<V, E> {
    /// A computation for the key is in flight.
    Computing {
        /// The thread running the computation.
        owner: ThreadId,
        /// Everyone who arrived while the computation was running.
        waiters: Vec<Notifier<Outcome<V, E>>>,
    },
    /// The computation finished. Immutable from here on.
    Resolved(Outcome<V, E>),
}

impl<V, E> Slot<V, E> {
    /// A fresh slot owned by the given thread.
    pub fn computing(owner: ThreadId) -> Self {
        Self::Computing { owner, waiters: Vec::new() }
    }

    /// The outcome, if the slot is resolved.
    pub fn outcome(&self) -> Option<&Outcome<V, E>> {
        match self {
            Self::Computing { .. } => None,
            Self::Resolved(outcome) => Some(outcome),
        }
    }

    /// Whether the slot is resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}
