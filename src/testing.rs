use std::cell::Cell;

thread_local! {
    /// How the last evaluation on this thread was served.
    static LAST_ORIGIN: Cell<Option<Origin>> = const { Cell::new(None) };
}

/// How an evaluation obtained its outcome.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The caller ran the computation itself.
    Computed,
    /// The outcome was already cached.
    Cached,
    /// The caller waited for a computation running on another thread.
    Coalesced,
}

/// How the last evaluation on this thread was served.
///
/// `None` if this thread has not finished an evaluation yet. Re-entrant calls
/// leave the previous value untouched.
pub fn last_origin() -> Option<Origin> {
    LAST_ORIGIN.with(|cell| cell.get())
}

/// Whether the last evaluation on this thread was served from the cache.
pub fn last_was_hit() -> bool {
    last_origin() == Some(Origin::Cached)
}

/// Records how the current evaluation was served.
pub(crate) fn register(origin: Origin) {
    LAST_ORIGIN.with(|cell| cell.set(Some(origin)))
}
