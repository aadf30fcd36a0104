use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::data_structures::UpdateFailure;

/// Fixed ring of preallocated value buffers.
///
/// The ring has `2 * N` slots but only ever holds `N` buffers, so the
/// claim cursor (`left`) and the return cursor (`right`) never need to
/// zero out or wrap a slot explicitly:
///
/// ```text
///  slots:  [ B0 | B1 | B2 | B3 | -- | -- | -- | -- ]     N = 4
///            ▲                   ▲
///          left = 0            right = 4
///
///  free buffers = right - left  (0 ..= N)
/// ```
///
/// Both cursors grow monotonically and wrap on overflow. Since `2 * N` is a
/// power of two, `cursor % (2 * N)` stays consistent across the wrap.
///
pub(crate) struct RecyclingQueue<T, const N: usize> {
    slots: Box<[AtomicPtr<T>]>,
    /// Next position to claim.
    left: CachePadded<AtomicUsize>,
    /// Next position to return into.
    right: CachePadded<AtomicUsize>,
}

impl<T, const N: usize> RecyclingQueue<T, N> {
    pub(crate) const CAPACITY: usize = 2 * N;

    /// Creates a queue holding `N` buffers produced by `make_buffer`.
    pub(crate) fn new(make_buffer: impl FnMut() -> T) -> Self {
        Self::starting_at(0, make_buffer)
    }

    /// Creates a queue whose cursors start at `origin`.
    pub(crate) fn starting_at(origin: usize, mut make_buffer: impl FnMut() -> T) -> Self {
        // All buffers stay boxed until the last one is built, so a panicking
        // `make_buffer` drops the ones made so far.
        //
        let buffers: Vec<Box<T>> = (0..N).map(|_| Box::new(make_buffer())).collect();

        let slots: Box<[AtomicPtr<T>]> = (0..Self::CAPACITY)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect();

        for (offset, buffer) in buffers.into_iter().enumerate() {
            let position = origin.wrapping_add(offset);
            slots[Self::index(position)].store(Box::into_raw(buffer), Ordering::Relaxed);
        }

        RecyclingQueue {
            slots,
            left: CachePadded::new(AtomicUsize::new(origin)),
            right: CachePadded::new(AtomicUsize::new(origin.wrapping_add(N))),
        }
    }

    #[inline]
    fn index(position: usize) -> usize {
        position % Self::CAPACITY
    }

    /// Snapshot of the claim and return cursors.
    #[inline]
    pub(crate) fn cursors(&self) -> (usize, usize) {
        let left = self.left.load(Ordering::Acquire);
        let right = self.right.load(Ordering::SeqCst);
        (left, right)
    }

    /// The return cursor, used to pick a usage generation.
    #[inline]
    pub(crate) fn return_cursor(&self) -> &AtomicUsize {
        &self.right
    }

    /// Number of pooled buffers for a cursor snapshot.
    #[inline]
    pub(crate) fn pooled(left: usize, right: usize) -> usize {
        right.wrapping_sub(left)
    }

    /// Claims the buffer at position `left`.
    ///
    /// Fails with `Exhausted` while the returner of that position is still
    /// between bumping `right` and storing its buffer, and with `Contended`
    /// when another updater claimed the position first.
    ///
    pub(crate) fn claim(&self, left: usize) -> Result<*mut T, UpdateFailure> {
        let slot = &self.slots[Self::index(left)];

        // The slot is stored after `right` moves past it, check it landed.
        //
        if slot.load(Ordering::Acquire).is_null() {
            return Err(UpdateFailure::Exhausted);
        }

        self.left
            .compare_exchange(
                left,
                left.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .map_err(|_| UpdateFailure::Contended)?;

        // Position `left` is ours, nobody else can swap this slot until the
        // claim cursor comes back around.
        //
        let buffer = slot.swap(ptr::null_mut(), Ordering::Acquire);
        debug_assert!(!buffer.is_null());
        Ok(buffer)
    }

    /// Returns a buffer to the pool.
    pub(crate) fn release(&self, buffer: *mut T) {
        debug_assert!(!buffer.is_null());

        let position = self.right.fetch_add(1, Ordering::SeqCst);

        // Release: the claimer of this position acquires the buffer contents.
        //
        self.slots[Self::index(position)].store(buffer, Ordering::Release);
    }
}

impl<T, const N: usize> Drop for RecyclingQueue<T, N> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            let buffer = *slot.get_mut();
            if !buffer.is_null() {
                // SAFETY: pooled buffers were allocated with `Box::new` and
                // are owned by the queue alone.
                unsafe { drop(Box::from_raw(buffer)) };
            }
        }
    }
}
