use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Generation-scoped usage counters.
///
/// A generation is a run of `budget` positions of the return cursor. Readers
/// and updaters register in the counter matching the parity of the
/// generation they observe, so the barrier only has to wait for the
/// *previous* generation to drain while the current one keeps going.
///
// Registration and the barrier's drain check form a store/load handshake
// across two different atomics (the counter and the return cursor), which
// only a single total order can make sound:
//
//   reader:   counters[p] += 1     ; load right (recheck parity p)
//   barrier:  load right           ; load counters[p]
//
// Either the barrier sees the increment, or the reader's recheck sees the
// cursor already in the next generation and re-registers there.
//
pub(crate) struct UsageTracker {
    counters: [CachePadded<AtomicUsize>; 2],
}

impl UsageTracker {
    pub(crate) fn new() -> Self {
        UsageTracker {
            counters: [
                CachePadded::new(AtomicUsize::new(0)),
                CachePadded::new(AtomicUsize::new(0)),
            ],
        }
    }

    /// Parity of the generation a return cursor position belongs to.
    #[inline]
    pub(crate) fn parity(right: usize, budget: usize) -> usize {
        (right / budget) & 1
    }

    /// Registers the caller in the generation currently observed through
    /// `return_cursor`. The registration lasts as long as the guard.
    pub(crate) fn enter<'a>(&'a self, return_cursor: &AtomicUsize, budget: usize) -> UsageGuard<'a> {
        let mut parity = Self::parity(return_cursor.load(Ordering::SeqCst), budget);

        loop {
            self.counters[parity].fetch_add(1, Ordering::SeqCst);

            let observed = Self::parity(return_cursor.load(Ordering::SeqCst), budget);
            if observed == parity {
                return UsageGuard {
                    counter: &self.counters[parity],
                };
            }

            // The cursor crossed into the other generation while registering.
            //
            self.counters[parity].fetch_sub(1, Ordering::Release);
            parity = observed;
        }
    }

    /// True while anyone registered in the generation preceding the one
    /// `right` belongs to is still active.
    #[inline]
    pub(crate) fn is_draining(&self, right: usize, budget: usize) -> bool {
        let previous = 1 - Self::parity(right, budget);
        self.counters[previous].load(Ordering::SeqCst) != 0
    }

    #[cfg(test)]
    pub(crate) fn active(&self, parity: usize) -> usize {
        self.counters[parity].load(Ordering::SeqCst)
    }
}

/// Scoped registration in a [`UsageTracker`] generation.
pub(crate) struct UsageGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for UsageGuard<'_> {
    fn drop(&mut self) {
        // Release: every read of the protected buffer happens before the
        // barrier observes this generation as drained.
        //
        self.counter.fetch_sub(1, Ordering::Release);
    }
}
