//! Single-flight memoization.
//!
//! An [`Executor`] wraps an expensive, deterministic function of a key. At
//! most one computation per key is ever in flight: callers that arrive while
//! it runs wait for its outcome instead of starting their own. Once a key is
//! resolved, its outcome is served from the cache for as long as the executor
//! lives. Failures are cached just like successes.
//!
//! ```
//! use std::thread;
//!
//! use flightcache::Executor;
//!
//! let executor = Executor::<u32, u64>::new();
//! thread::scope(|s| {
//!     for _ in 0..3 {
//!         s.spawn(|| executor.evaluate(40, |&n| Ok(u64::from(n) * 2)));
//!     }
//! });
//! assert_eq!(executor.get(&40), Some(Ok(80)));
//! ```

mod error;
mod executor;
mod notify;
mod registry;
mod slot;
#[cfg(feature = "testing")]
pub mod testing;

pub use crate::error::{Error, Outcome};
pub use crate::executor::Executor;

#[cfg(feature = "macros")]
pub use flightcache_macros::single_flight;

/// These are implementation details. Do not rely on them!
#[doc(hidden)]
pub mod internal {
    /// Ensure a type is usable as part of a single-flight key.
    pub fn assert_key<T: Clone + std::hash::Hash + Eq + Send + Sync + 'static>() {}

    /// Ensure a type is usable as a single-flight output.
    pub fn assert_output<T: Clone + Send + Sync + 'static>() {}

    /// Recover the value of an infallible evaluation, resuming a panic that
    /// happened in the computation.
    #[track_caller]
    pub fn unwrap_infallible<T>(outcome: crate::Outcome<T, std::convert::Infallible>) -> T {
        match outcome {
            Ok(value) => value,
            Err(crate::Error::Computation(never)) => match never {},
            Err(err) => panic!("flightcache: {err}"),
        }
    }
}
