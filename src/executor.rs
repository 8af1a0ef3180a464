use std::convert::Infallible;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::error::{Error, Outcome};
use crate::notify;
use crate::registry::{Claim, Probe, Registry};

/// Runs an expensive, deterministic function at most once per key.
///
/// Every concurrent caller for the same key shares the outcome of a single
/// computation, and once a key is resolved its outcome is served from the
/// cache for the lifetime of the executor. Failures are cached just like
/// successes.
///
/// ```
/// use flightcache::Executor;
///
/// static SQUARES: Executor<u64, u64> = Executor::new();
///
/// let square = SQUARES.evaluate(12, |&n| Ok(n * n));
/// assert_eq!(square, Ok(144));
/// assert!(SQUARES.is_resolved(&12));
/// ```
pub struct Executor<K, V, E = Infallible> {
    registry: Registry<K, V, E>,
}

impl<K, V, E> Executor<K, V, E> {
    /// Create an executor with an empty cache.
    pub const fn new() -> Self {
        Self { registry: Registry::new() }
    }

    /// Create an executor with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { registry: Registry::with_capacity(capacity) }
    }

    /// The number of keys ever requested, resolved or not.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no key was ever requested.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl<K, V, E> Executor<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    /// Produce the outcome for a key, computing it only if nobody else has.
    ///
    /// If the key is unknown, `func` runs on the calling thread without any
    /// lock held, and its outcome is handed to every caller that arrived in
    /// the meantime. If another thread is already computing the key, this
    /// blocks until that computation finishes. If the key is resolved, the
    /// cached outcome is returned right away.
    ///
    /// Calling this for a key that the current thread is computing returns
    /// [`Error::Reentrant`] instead of deadlocking.
    pub fn evaluate<F>(&self, key: K, func: F) -> Outcome<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        self.run(key, None, func)
    }

    /// Like [`evaluate`](Self::evaluate), but gives up waiting after
    /// `timeout`.
    ///
    /// The timeout only applies when another thread is computing the key. A
    /// caller that gives up receives [`Error::TimedOut`], while the
    /// computation itself carries on and is cached as usual. If this caller
    /// ends up computing, the computation is never cut short.
    pub fn evaluate_timeout<F>(&self, key: K, timeout: Duration, func: F) -> Outcome<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        self.run(key, Some(timeout), func)
    }

    /// The cached outcome for a key, without computing anything.
    ///
    /// Returns `None` while the key is unknown or still being computed.
    pub fn get(&self, key: &K) -> Option<Outcome<V, E>> {
        match self.registry.lookup(key) {
            Probe::Resolved(outcome) => Some(outcome),
            Probe::Absent | Probe::Computing => None,
        }
    }

    /// Whether a key's outcome is cached.
    pub fn is_resolved(&self, key: &K) -> bool {
        self.registry.is_resolved(key)
    }

    /// Whether a computation for a key is in flight.
    pub fn is_computing(&self, key: &K) -> bool {
        matches!(self.registry.lookup(key), Probe::Computing)
    }

    /// All keys with a cached outcome, in no particular order.
    pub fn resolved_keys(&self) -> Vec<K> {
        self.registry.resolved_keys()
    }

    fn run<F>(&self, key: K, timeout: Option<Duration>, func: F) -> Outcome<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        // Resolved keys only need the shared lock.
        if let Probe::Resolved(outcome) = self.registry.lookup(&key) {
            tracing::trace!("serving cached outcome");

            #[cfg(feature = "testing")]
            crate::testing::register(crate::testing::Origin::Cached);

            return outcome;
        }

        self.claim_or_wait(key, timeout, func)
    }

    /// Claim a key that was not resolved at probe time, then compute it,
    /// wait for it, or serve it if it got resolved in between.
    fn claim_or_wait<F>(&self, key: K, timeout: Option<Duration>, func: F) -> Outcome<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        match self.registry.claim(key.clone()) {
            Claim::Created => self.compute(key, func),
            Claim::Resolved(outcome) => {
                // Resolved between the probe and the claim.
                tracing::trace!("serving outcome resolved during claim");

                #[cfg(feature = "testing")]
                crate::testing::register(crate::testing::Origin::Cached);

                outcome
            }
            Claim::Waiting(waiter) => {
                tracing::trace!("waiting for a concurrent computation");

                #[cfg(feature = "testing")]
                crate::testing::register(crate::testing::Origin::Coalesced);

                match timeout {
                    None => waiter.wait().unwrap_or(Err(Error::Panicked)),
                    Some(timeout) => match waiter.wait_timeout(timeout) {
                        Some(outcome) => outcome,
                        // The outcome may have landed right at the deadline.
                        None => self.get(&key).unwrap_or(Err(Error::TimedOut)),
                    },
                }
            }
            Claim::Reentrant => {
                tracing::warn!("re-entrant evaluation of a key under computation");
                Err(Error::Reentrant)
            }
        }
    }

    /// Run the computation as the sole computer for a freshly claimed key.
    fn compute<F>(&self, key: K, func: F) -> Outcome<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let started = Instant::now();
        tracing::debug!("starting computation");

        let pending = Pending { registry: &self.registry, key, resolved: false };
        let outcome = func(&pending.key).map_err(Error::Computation);
        let waiters = pending.resolve(&outcome);

        tracing::debug!(
            elapsed = ?started.elapsed(),
            waiters,
            failed = outcome.is_err(),
            "finished computation"
        );

        #[cfg(feature = "testing")]
        crate::testing::register(crate::testing::Origin::Computed);

        outcome
    }
}

impl<K, V, E> Default for Executor<K, V, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A claimed key whose computation is in progress.
///
/// Resolves the slot with [`Error::Panicked`] if dropped without an outcome,
/// so that waiters are released when the computation unwinds.
struct Pending<'a, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    registry: &'a Registry<K, V, E>,
    key: K,
    resolved: bool,
}

impl<K, V, E> Pending<'_, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    /// Store the outcome and notify everyone who waited for it.
    ///
    /// Returns how many waiters received the outcome.
    fn resolve(mut self, outcome: &Outcome<V, E>) -> usize {
        self.resolved = true;
        self.publish(outcome)
    }

    fn publish(&self, outcome: &Outcome<V, E>) -> usize {
        // The write lock is released before the fan-out starts.
        let waiters = self.registry.resolve(&self.key, outcome.clone());
        notify::fan_out(waiters, outcome)
    }
}

impl<K, V, E> Drop for Pending<'_, K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!("computation panicked, recording the failure");
            self.publish(&Err(Error::Panicked));
        }
    }
}
