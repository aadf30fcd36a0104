//! Common contract for shared values updated through closures.
//!
//! Both the lock-free [`AtomicData`] and the serialized [`MutexData`]
//! implement [`SharedData`], so tests and benchmarks can swap one for the
//! other without touching the calling code:
//!
//! ```text
//! SharedData<T>
//!     │
//!     ├── AtomicData<T, N>   (lock-free, copy-update-publish)
//!     └── MutexData<T>       (single mutex, timing baseline)
//! ```
//!
//! [`AtomicData`]: crate::data_structures::AtomicData
//! [`MutexData`]: crate::data_structures::MutexData

use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;

/// Attempts after which a single `update` call reports itself as slow.
const SLOW_UPDATE_ATTEMPTS: usize = 1 << 16;

/// Reason a single update attempt did not publish a new value.
///
/// Every variant is transient and leaves the published value untouched.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateFailure {
    /// No pooled buffer was available to copy into.
    Exhausted,
    /// A generation boundary is pending and the previous generation has not drained yet.
    Barrier,
    /// Another updater claimed the same queue slot first.
    Contended,
    /// The mutator returned `false`.
    Declined,
    /// Another update was published between the copy and the publish.
    Stale,
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            UpdateFailure::Exhausted => "no free buffer in the recycling queue",
            UpdateFailure::Barrier => "generation barrier has not drained",
            UpdateFailure::Contended => "queue slot claimed by another updater",
            UpdateFailure::Declined => "mutator declined the update",
            UpdateFailure::Stale => "value changed before publish",
        };
        f.write_str(reason)
    }
}

impl Error for UpdateFailure {}

/// A value shared between threads, accessed only through closures.
///
/// The wrapped value is never handed out by reference outside a closure:
/// for lock-free implementations its address changes on every update.
///
pub trait SharedData<T> {
    /// Invokes `visitor` on the current value and returns its result.
    fn read<R, F>(&self, visitor: F) -> R
    where
        F: FnOnce(&T) -> R;

    /// Performs a single update attempt.
    ///
    /// The mutator receives a private copy of the current value. Returning
    /// `false` from it abandons the attempt without publishing anything.
    ///
    fn try_update<F>(&self, mutator: F) -> Result<(), UpdateFailure>
    where
        F: FnMut(&mut T) -> bool;

    /// Single update attempt, `true` when a new value was published.
    fn update_weak<F>(&self, mutator: F) -> bool
    where
        F: FnMut(&mut T) -> bool,
    {
        self.try_update(mutator).is_ok()
    }

    /// Retries `update_weak` until the mutator's result is published.
    ///
    /// The mutator may run many times, once per attempt. A mutator that
    /// always returns `false` makes this loop forever.
    ///
    /// Must not be called on the same value from inside its own mutator.
    ///
    fn update<F>(&self, mut mutator: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        let backoff = Backoff::new();
        let start = Instant::now();
        let mut attempts = 0usize;

        while !self.update_weak(&mut mutator) {
            attempts += 1;
            if attempts == SLOW_UPDATE_ATTEMPTS {
                report_slow_update(attempts, start.elapsed());
            }
            backoff.snooze();
        }
    }

    /// Returns a clone of the current value.
    fn load(&self) -> T
    where
        T: Clone,
    {
        self.read(T::clone)
    }
}

#[cold]
fn report_slow_update(attempts: usize, elapsed: Duration) {
    tracing::warn!(
        attempts,
        elapsed_us = elapsed.as_micros() as u64,
        "SLOW_UPDATE: update() is still retrying under contention"
    );
}
