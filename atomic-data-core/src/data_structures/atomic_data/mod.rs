//! Lock-free container for values of arbitrary size.
//!
//! # Protocol
//!
//! ```text
//!              claim                copy + mutate            publish (CAS)
//!  ┌───────┐ ────────► ┌─────────┐ ──────────────► ┌─────────┐ ─────────► current
//!  │ queue │           │ scratch │                 │ scratch │
//!  └───────┘ ◄──────── └─────────┘                 └─────────┘
//!      ▲      release (declined / stale)
//!      │
//!      └──────────────── previous current (on successful publish)
//! ```
//!
//! Buffers are recycled instead of freed. A reader may still be looking at
//! a buffer that was just retired, so claims are grouped in generations
//! of `N` and the first claim of a generation waits (see [`sync_barrier`])
//! until nobody registered in the previous generation is left.
//!
//! Invariants:
//! 1. A buffer is owned by exactly one of: the queue, one updater, or the
//!    current pointer.
//! 2. A buffer is never claimed while a reader that could have loaded it
//!    as the current value is still registered.
//! 3. Every update attempt returns exactly one buffer to the queue, on
//!    success, failure, or panic.

mod recycling_queue;
mod sync_barrier;
mod usage_tracker;

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::thread;

use recycling_queue::RecyclingQueue;
use usage_tracker::{UsageGuard, UsageTracker};

use crate::data_structures::{SharedData, UpdateFailure};

/// Default concurrency budget, matches roughly twice the number of
/// concurrently updating threads of a small machine.
pub const DEFAULT_BUDGET: usize = 8;

/// A value shared by many threads, updated by copy-update-publish.
///
/// `N` is the concurrency budget: `N` pooled buffers (plus the current
/// one) are allocated up front and the barrier runs once every `N`
/// claims. It must be a non-zero power of two.
///
/// # Example
///
/// ```
/// use atomic_data_core::AtomicData;
///
/// let counter: AtomicData<u64> = AtomicData::new(0);
/// counter.update(|value| {
///     *value += 1;
///     true
/// });
/// assert_eq!(counter.read(|value| *value), 1);
/// ```
///
pub struct AtomicData<T, const N: usize = DEFAULT_BUDGET> {
    current: AtomicPtr<T>,
    queue: RecyclingQueue<T, N>,
    usage: UsageTracker,
    _owns: PhantomData<Box<T>>,
}

// SAFETY: buffers are cloned and dropped on arbitrary threads (`Send`) and
// read through shared references from many threads at once (`Sync`).
unsafe impl<T: Send + Sync, const N: usize> Send for AtomicData<T, N> {}
unsafe impl<T: Send + Sync, const N: usize> Sync for AtomicData<T, N> {}

impl<T, const N: usize> AtomicData<T, N> {
    const BUDGET: usize = {
        assert!(N > 0, "concurrency budget must be > 0");
        assert!(N.is_power_of_two(), "concurrency budget must be a power of two");
        N
    };

    /// Concurrency budget (`N`).
    pub const fn budget() -> usize {
        Self::BUDGET
    }

    /// Number of slots in the recycling queue (`2 * N`).
    pub const fn capacity() -> usize {
        RecyclingQueue::<T, N>::CAPACITY
    }

    #[inline]
    fn enter(&self) -> UsageGuard<'_> {
        self.usage.enter(self.queue.return_cursor(), N)
    }

    /// Invokes `visitor` on the current value.
    ///
    /// Never fails and never retries the visitor. The buffer seen by the
    /// visitor stays untouched until the visitor returns, even if other
    /// threads publish newer values meanwhile.
    ///
    /// The visitor must not update this same container. Its registration
    /// holds back the barrier, so after at most `N` publishes every further
    /// attempt reports [`UpdateFailure::Barrier`] until the visitor returns,
    /// and [`update`](Self::update) called from inside it never returns.
    ///
    pub fn read<R>(&self, visitor: impl FnOnce(&T) -> R) -> R {
        let _usage = self.enter();

        // Acquire: pairs with the publishing CAS in `try_update`.
        //
        let current = self.current.load(Ordering::Acquire);

        // SAFETY: `current` was published and is protected from recycling
        // by the usage registration above.
        visitor(unsafe { &*current })
    }

    /// Returns a clone of the current value.
    pub fn load(&self) -> T
    where
        T: Clone,
    {
        self.read(T::clone)
    }

    /// Exclusive access to the value, no protocol required.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: `&mut self` rules out concurrent readers and updaters.
        unsafe { &mut **self.current.get_mut() }
    }

    /// Consumes the container and returns the current value.
    pub fn into_inner(mut self) -> T {
        let current = std::mem::replace(self.current.get_mut(), std::ptr::null_mut());

        // SAFETY: the current buffer is owned by the container and the
        // pointer is cleared, so `Drop` will not free it a second time.
        *unsafe { Box::from_raw(current) }
    }
}

impl<T: Clone, const N: usize> AtomicData<T, N> {
    /// Creates a container publishing `value` and preallocating `N` buffers.
    pub fn new(value: T) -> Self {
        let budget = Self::BUDGET;
        let queue = RecyclingQueue::new(|| value.clone());

        tracing::trace!(budget, capacity = Self::capacity(), "atomic data created");

        AtomicData {
            current: AtomicPtr::new(Box::into_raw(Box::new(value))),
            queue,
            usage: UsageTracker::new(),
            _owns: PhantomData,
        }
    }

    /// Performs a single copy-update-publish attempt.
    ///
    /// The mutator runs at most once, on a private copy of the current
    /// value. On any error the published value is unchanged.
    ///
    pub fn try_update(&self, mut mutator: impl FnMut(&mut T) -> bool) -> Result<(), UpdateFailure> {
        let (left, right) = self.queue.cursors();

        if left == right {
            thread::yield_now();
            return Err(UpdateFailure::Exhausted);
        }

        sync_barrier::check::<T, N>(left, right, &self.usage)?;

        let scratch = self.queue.claim(left)?;

        // From here on exactly one buffer goes back to the queue, whichever
        // way this function exits.
        //
        let mut pending = PendingRelease {
            queue: &self.queue,
            buffer: scratch,
            _usage: self.enter(),
        };

        // Acquire: the copy below must see the published contents.
        //
        let observed = self.current.load(Ordering::Acquire);

        // SAFETY: `scratch` was claimed by this thread only. `observed` is
        // protected from recycling by the usage registration in `pending`.
        let copy = unsafe { &mut *scratch };
        copy.clone_from(unsafe { &*observed });

        if !mutator(copy) {
            return Err(UpdateFailure::Declined);
        }

        // Release: publishes the mutated copy to readers. `observed` cannot
        // be recycled and republished while we are registered, so a pointer
        // match means no other update was published in between.
        //
        match self
            .current
            .compare_exchange(observed, scratch, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(previous) => {
                pending.buffer = previous;
                Ok(())
            }
            Err(_) => Err(UpdateFailure::Stale),
        }
    }

    /// Single update attempt, `true` when a new value was published.
    pub fn update_weak(&self, mutator: impl FnMut(&mut T) -> bool) -> bool {
        self.try_update(mutator).is_ok()
    }

    /// Retries until the mutator's result is published.
    ///
    /// The mutator runs once per attempt, so side effects inside it must be
    /// idempotent or tied to its return value. Calling `update` on the same
    /// container from inside the mutator, or from inside a [`read`](Self::read)
    /// visitor, can stall forever at the barrier.
    ///
    pub fn update(&self, mutator: impl FnMut(&mut T) -> bool) {
        SharedData::update(self, mutator)
    }
}

/// Returns a buffer to the queue when dropped, then ends the usage
/// registration.
struct PendingRelease<'a, T, const N: usize> {
    queue: &'a RecyclingQueue<T, N>,
    buffer: *mut T,
    _usage: UsageGuard<'a>,
}

impl<T, const N: usize> Drop for PendingRelease<'_, T, N> {
    fn drop(&mut self) {
        self.queue.release(self.buffer);
    }
}

impl<T, const N: usize> Drop for AtomicData<T, N> {
    fn drop(&mut self) {
        let current = *self.current.get_mut();
        if !current.is_null() {
            // SAFETY: the current buffer is owned by the container.
            unsafe { drop(Box::from_raw(current)) };
        }
    }
}

impl<T: Clone, const N: usize> SharedData<T> for AtomicData<T, N> {
    fn read<R, F>(&self, visitor: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        AtomicData::read(self, visitor)
    }

    fn try_update<F>(&self, mutator: F) -> Result<(), UpdateFailure>
    where
        F: FnMut(&mut T) -> bool,
    {
        AtomicData::try_update(self, mutator)
    }
}

impl<T: Clone, const N: usize> Clone for AtomicData<T, N> {
    /// Deep copy into a new container with its own buffers.
    fn clone(&self) -> Self {
        AtomicData::new(self.load())
    }
}

impl<T: Clone + Default, const N: usize> Default for AtomicData<T, N> {
    fn default() -> Self {
        AtomicData::new(T::default())
    }
}

impl<T: Clone, const N: usize> From<T> for AtomicData<T, N> {
    fn from(value: T) -> Self {
        AtomicData::new(value)
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for AtomicData<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|value| f.debug_tuple("AtomicData").field(value).finish())
    }
}

impl<T: PartialEq, const N: usize> PartialEq for AtomicData<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.read(|lhs| other.read(|rhs| lhs == rhs))
    }
}

impl<T: Eq, const N: usize> Eq for AtomicData<T, N> {}

impl<T: PartialOrd, const N: usize> PartialOrd for AtomicData<T, N> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        self.read(|lhs| other.read(|rhs| lhs.partial_cmp(rhs)))
    }
}

impl<T: Ord, const N: usize> Ord for AtomicData<T, N> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.read(|lhs| other.read(|rhs| lhs.cmp(rhs)))
    }
}
