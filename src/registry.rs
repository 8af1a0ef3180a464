use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::mem;
use std::thread;

use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::error::Outcome;
use crate::notify::{self, Notifier, Waiter};
use crate::slot::Slot;

/// Maps keys to their slots.
///
/// Grows monotonically; slots are never removed. Reads take the shared lock
/// and run in parallel. Claiming and resolving take the exclusive lock, but
/// only for the bookkeeping, never across a computation.
pub struct Registry<K, V, E> {
    map: RwLock<FxHashMap<K, Slot<V, E>>>,
}

/// What a read-only probe found for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<V, E> {
    /// The key was never requested.
    Absent,
    /// A computation for the key is in flight.
    Computing,
    /// The key is resolved.
    Resolved(Outcome<V, E>),
}

/// What claiming a key decided for the caller.
pub enum Claim<V, E> {
    /// The caller created the slot and is now the sole computer for the key.
    /// It must eventually call [`Registry::resolve`].
    Created,
    /// The key was already resolved.
    Resolved(Outcome<V, E>),
    /// Another caller is computing. The caller was attached as a waiter.
    Waiting(Waiter<Outcome<V, E>>),
    /// The calling thread is itself computing this key.
    Reentrant,
}

impl<K, V, E> Registry<K, V, E> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self { map: RwLock::new(HashMap::with_hasher(FxBuildHasher)) }
    }

    /// Create an empty registry with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity_and_hasher(capacity, FxBuildHasher)),
        }
    }

    /// The number of keys ever requested.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether no key was ever requested.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl<K, V, E> Registry<K, V, E>
where
    K: Hash + Eq,
    V: Clone,
    E: Clone,
{
    /// Probe a key without creating anything.
    pub fn lookup(&self, key: &K) -> Probe<V, E> {
        match self.map.read().get(key) {
            None => Probe::Absent,
            Some(Slot::Computing { .. }) => Probe::Computing,
            Some(Slot::Resolved(outcome)) => Probe::Resolved(outcome.clone()),
        }
    }

    /// Create the slot for a key, or join the slot that is already there.
    ///
    /// Inspecting the slot, creating it and attaching a waiter all happen in
    /// one exclusive window. Exactly one caller per key ever observes
    /// [`Claim::Created`]. A caller that arrives after resolution gets the
    /// outcome directly instead of waiting on a list nobody services anymore.
    pub fn claim(&self, key: K) -> Claim<V, E> {
        let current = thread::current().id();
        let mut map = self.map.write();
        match map.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(Slot::computing(current));
                Claim::Created
            }
            Entry::Occupied(entry) => match entry.into_mut() {
                Slot::Resolved(outcome) => Claim::Resolved(outcome.clone()),
                Slot::Computing { owner, .. } if *owner == current => Claim::Reentrant,
                Slot::Computing { waiters, .. } => {
                    let (notifier, waiter) = notify::channel();
                    waiters.push(notifier);
                    Claim::Waiting(waiter)
                }
            },
        }
    }

    /// Transition a key's slot from computing to resolved.
    ///
    /// Returns the frozen list of waiters, to be notified after the lock is
    /// released. No waiter can be attached after this point. Must only be
    /// called once per key, by the caller that observed [`Claim::Created`].
    pub fn resolve(&self, key: &K, outcome: Outcome<V, E>) -> Vec<Notifier<Outcome<V, E>>> {
        let mut map = self.map.write();
        let Some(slot) = map.get_mut(key) else {
            debug_assert!(false, "flightcache: resolved a key that was never claimed");
            return Vec::new();
        };

        if slot.is_resolved() {
            debug_assert!(false, "flightcache: resolved a key twice");
            return Vec::new();
        }

        match mem::replace(slot, Slot::Resolved(outcome)) {
            Slot::Computing { waiters, .. } => waiters,
            Slot::Resolved(_) => Vec::new(),
        }
    }

    /// Whether a key is resolved.
    pub fn is_resolved(&self, key: &K) -> bool {
        self.map.read().get(key).is_some_and(Slot::is_resolved)
    }

    /// All keys that are resolved, in no particular order.
    pub fn resolved_keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.map
            .read()
            .iter()
            .filter(|(_, slot)| slot.outcome().is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl<K, V, E> Default for Registry<K, V, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::error::Error;

    type TestRegistry = Registry<u32, String, String>;

    #[test]
    fn test_claim_creates_once() {
        let registry = TestRegistry::new();
        assert_eq!(registry.lookup(&1), Probe::Absent);
        assert!(matches!(registry.claim(1), Claim::Created));
        assert_eq!(registry.lookup(&1), Probe::Computing);
        assert_eq!(registry.len(), 1);

        let joined = thread::scope(|s| s.spawn(|| registry.claim(1)).join().unwrap());
        assert!(matches!(joined, Claim::Waiting(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_thread_claim_is_reentrant() {
        let registry = TestRegistry::new();
        assert!(matches!(registry.claim(4), Claim::Created));
        assert!(matches!(registry.claim(4), Claim::Reentrant));
    }

    #[test]
    fn test_resolve_hands_out_waiters() {
        let registry = TestRegistry::new();
        assert!(matches!(registry.claim(2), Claim::Created));

        let waiters: Vec<_> = thread::scope(|s| {
            (0..3)
                .map(|_| s.spawn(|| registry.claim(2)).join().unwrap())
                .collect()
        });

        let notifiers = registry.resolve(&2, Ok("two".into()));
        assert_eq!(notifiers.len(), 3);
        assert_eq!(notify::fan_out(notifiers, &Ok("two".into())), 3);

        for claim in waiters {
            let Claim::Waiting(waiter) = claim else { panic!("expected a waiter") };
            assert_eq!(waiter.wait(), Some(Ok("two".to_string())));
        }
    }

    #[test]
    fn test_claim_after_resolve() {
        let registry = TestRegistry::new();
        assert!(matches!(registry.claim(3), Claim::Created));
        registry.resolve(&3, Err(Error::Computation("broken".into())));

        let Claim::Resolved(outcome) = registry.claim(3) else {
            panic!("expected the resolved outcome")
        };
        assert_eq!(outcome, Err(Error::Computation("broken".into())));
        assert!(registry.is_resolved(&3));
        assert_eq!(registry.resolved_keys(), vec![3]);
    }

    #[test]
    fn test_resolved_keys_skip_computing() {
        let registry = TestRegistry::with_capacity(8);
        assert!(registry.is_empty());
        for key in 0..4 {
            assert!(matches!(registry.claim(key), Claim::Created));
        }
        registry.resolve(&1, Ok("one".into()));
        registry.resolve(&3, Ok("three".into()));

        let mut keys = registry.resolved_keys();
        keys.sort();
        assert_eq!(keys, vec![1, 3]);
        assert!(!registry.is_resolved(&0));
    }
}
