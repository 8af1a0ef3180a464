use std::mem;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Create a connected one-shot notification pair.
///
/// The [`Notifier`] end is held by whoever will eventually produce the value
/// and the [`Waiter`] end by the caller blocked on it. Each pair carries at
/// most one value and is never reused.
pub fn channel<T>() -> (Notifier<T>, Waiter<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending),
        ready: Condvar::new(),
    });
    let notifier = Notifier { shared: Arc::downgrade(&shared), sent: false };
    (notifier, Waiter { shared })
}

/// Deliver a value to every notifier in a frozen list.
///
/// Delivery never blocks on a receiver. Waiters that already gave up are
/// skipped. Returns how many waiters actually received the value.
pub fn fan_out<T: Clone>(notifiers: Vec<Notifier<T>>, value: &T) -> usize {
    let total = notifiers.len();
    let delivered = notifiers
        .into_iter()
        .map(|notifier| notifier.notify(value.clone()))
        .filter(|&ok| ok)
        .count();

    if delivered < total {
        tracing::debug!(
            abandoned = total - delivered,
            "waiters stopped listening before notification"
        );
    }

    delivered
}

/// The state shared by both ends of a pair.
struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

enum State<T> {
    /// Nothing was sent yet.
    Pending,
    /// A value is buffered and waits to be picked up.
    Ready(T),
    /// The value was taken or the notifier vanished without sending.
    Closed,
}

impl<T> State<T> {
    fn take(&mut self) -> Option<T> {
        match mem::replace(self, State::Closed) {
            State::Ready(value) => Some(value),
            State::Pending | State::Closed => None,
        }
    }
}

/// The sending end of a one-shot pair.
///
/// Only holds a weak reference, so a waiter that was dropped is observable
/// as such and sending to it becomes a no-op.
pub struct Notifier<T> {
    shared: Weak<Shared<T>>,
    sent: bool,
}

impl<T> Notifier<T> {
    /// Buffer the value for the waiter and wake it up.
    ///
    /// Returns `false` if the waiter was abandoned in the meantime.
    pub fn notify(mut self, value: T) -> bool {
        self.sent = true;
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };

        let mut state = shared.state.lock();
        if !matches!(*state, State::Pending) {
            // The waiter already gave up.
            return false;
        }

        *state = State::Ready(value);
        drop(state);
        shared.ready.notify_one();
        true
    }
}

impl<T> Drop for Notifier<T> {
    fn drop(&mut self) {
        if self.sent {
            return;
        }

        // Close the pair so that the waiter cannot hang forever.
        if let Some(shared) = self.shared.upgrade() {
            let mut state = shared.state.lock();
            if matches!(*state, State::Pending) {
                *state = State::Closed;
            }
            drop(state);
            shared.ready.notify_one();
        }
    }
}

/// The receiving end of a one-shot pair.
pub struct Waiter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Waiter<T> {
    /// Block until the value arrives.
    ///
    /// Returns `None` if the notifier was dropped without sending.
    pub fn wait(self) -> Option<T> {
        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending) {
            self.shared.ready.wait(&mut state);
        }
        state.take()
    }

    /// Block until the value arrives or the timeout elapses.
    ///
    /// Returns `None` on timeout or if the notifier was dropped without
    /// sending. Giving up drops this end, which the notifier then observes as
    /// an abandoned waiter.
    pub fn wait_timeout(self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };

        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending) {
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.take()
    }
}
