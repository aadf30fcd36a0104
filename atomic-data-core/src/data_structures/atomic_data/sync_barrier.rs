use std::thread;

use super::recycling_queue::RecyclingQueue;
use super::usage_tracker::UsageTracker;
use crate::data_structures::UpdateFailure;

/// Decides whether a claim at position `left` may proceed.
///
/// Claims are grouped in generations of `N` positions. Buffers pooled
/// during a generation may still be referenced by readers that registered
/// in it, so the first claim of the next generation has to wait until:
///
/// 1. every buffer handed out so far is back in the pool (`right - left == N`),
/// 2. the usage counter of the previous generation has dropped to zero.
///
/// The check never blocks: the crossing thread yields once and reports
/// [`UpdateFailure::Barrier`], leaving the retry to the caller.
///
pub(crate) fn check<T, const N: usize>(
    left: usize,
    right: usize,
    usage: &UsageTracker,
) -> Result<(), UpdateFailure> {
    if left % N != 0 {
        return Ok(());
    }

    if RecyclingQueue::<T, N>::pooled(left, right) < N {
        tracing::trace!(left, right, "barrier waiting for in-flight buffers");
        thread::yield_now();
        return Err(UpdateFailure::Barrier);
    }

    if usage.is_draining(right, N) {
        tracing::trace!(left, right, "barrier waiting for previous generation");
        thread::yield_now();
        return Err(UpdateFailure::Barrier);
    }

    Ok(())
}
