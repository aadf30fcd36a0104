//! Lock-free singly linked list built from [`AtomicData`] nodes.
//!
//! Every node is a container of its own, so the list has no atomics of its
//! own: inserts and erases are weak updates of the predecessor node.
//!
//! ```text
//!  ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
//!  │ HEAD │───►│  10  │───►│  20  │───►│  30  │───► None
//!  │(sent)│    │      │    │      │    │      │
//!  └──────┘    └──────┘    └──────┘    └──────┘
//! ```
//!
//! [`AtomicData`]: crate::data_structures::AtomicData

mod list_cursor;
mod list_node;

use std::fmt;
use std::sync::Arc;

use crossbeam_utils::Backoff;

pub use list_cursor::{Cursor, Iter};
pub use list_node::{AtomicNode, ListNode};

use crate::data_structures::{AtomicData, DEFAULT_BUDGET};

// =============================================================================
// ERASE (Two-Phase, lock then splice)
// =============================================================================
//
// A node can only be unlinked by its predecessor, so the victim is first
// locked to freeze its `next` link. Both phases run inside one weak update
// of the predecessor:
//
// Before:   pos ──────► victim ──────► next
//
// Phase 1 - nested update_weak on victim sets `locked`:
//           pos ──────► victim(L) ──────► next
//
// Phase 2 - the predecessor's copy skips the victim, then gets published:
//           pos ────────────────────────► next
//                       victim(L) ──────► next   (still readable by cursors)
//
// If the predecessor's publish loses its race after phase 1, the victim is
// unlocked again. On success the victim is also marked `deleted`.
//
// A locked node never gets a new successor (inserts after it are refused)
// and is never erased twice (its own lock fails the nested update).
//
// =============================================================================

/// Concurrent singly linked list with lock-coupled deletion.
///
/// `N` is the concurrency budget of every node container and must be at
/// least 2, since an erase holds a buffer of the predecessor and of the
/// victim at the same time.
///
/// Operations ending in `_weak` make a single attempt and report failure
/// through an end cursor; the caller decides whether to retry at the same
/// or another position.
///
pub struct AtomicList<T, const N: usize = DEFAULT_BUDGET> {
    head: Arc<AtomicNode<T, N>>,
}

impl<T, const N: usize> AtomicList<T, N> {
    const BUDGET: usize = {
        assert!(N >= 2, "list nodes need a concurrency budget of at least 2");
        N
    };

    /// Cursor to the head sentinel.
    pub fn begin(&self) -> Cursor<T, N> {
        Cursor::new(Arc::clone(&self.head))
    }

    /// Cursor past the last node.
    pub fn end(&self) -> Cursor<T, N> {
        Cursor::end()
    }

    pub fn iter(&self) -> Iter<T, N> {
        Iter::new(self.begin())
    }

    /// Number of elements, head excluded. Walks the whole list.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    pub fn empty(&self) -> bool {
        !self.head.read(ListNode::has_next)
    }
}

impl<T: Clone, const N: usize> AtomicList<T, N> {
    pub fn new() -> Self {
        let budget = Self::BUDGET;
        tracing::trace!(budget, "atomic list created");

        AtomicList {
            head: Arc::new(AtomicData::new(ListNode::sentinel())),
        }
    }

    /// Links `value` in right after `position` in a single attempt.
    ///
    /// Returns a cursor to the new node, or the end cursor when `position`
    /// is the end, locked, deleted, or the attempt lost a race. `value` is
    /// dropped on failure.
    ///
    pub fn insert_after_weak(&self, position: &Cursor<T, N>, value: T) -> Cursor<T, N> {
        let Some(node) = position.node() else {
            return Cursor::end();
        };

        let mut value = Some(value);
        let mut created = None;

        let published = node.update_weak(|current| {
            if !current.accepts_successor() {
                return false;
            }
            let Some(value) = value.take() else {
                return false;
            };

            let fresh = Arc::new(AtomicData::new(ListNode::new(value, current.next.take())));
            current.next = Some(Arc::clone(&fresh));
            created = Some(fresh);
            true
        });

        match created {
            Some(fresh) if published => Cursor::new(fresh),
            _ => Cursor::end(),
        }
    }

    /// Inserts `value` as the first element.
    ///
    /// The head is never locked, so this only retries on contention.
    ///
    pub fn push_front(&self, value: T) -> Cursor<T, N> {
        let head = self.begin();
        let backoff = Backoff::new();

        loop {
            let inserted = self.insert_after_weak(&head, value.clone());
            if !inserted.is_end() {
                return inserted;
            }
            backoff.snooze();
        }
    }

    /// Unlinks the node following `position` in a single attempt.
    ///
    /// Returns a cursor to the erased node, which stays locked and is
    /// marked deleted, or the end cursor when there is nothing to erase,
    /// `position` or its successor is locked, or the attempt lost a race.
    ///
    pub fn erase_after_weak(&self, position: &Cursor<T, N>) -> Cursor<T, N> {
        let Some(node) = position.node() else {
            return Cursor::end();
        };

        let mut victim = None;

        let published = node.update_weak(|current| {
            if !current.accepts_successor() {
                return false;
            }
            let Some(next) = current.next.clone() else {
                return false;
            };

            let mut successor = None;
            let locked = next.update_weak(|candidate| {
                if candidate.locked {
                    return false;
                }
                candidate.locked = true;
                successor = candidate.next.clone();
                true
            });
            if !locked {
                return false;
            }

            current.next = successor;
            victim = Some(next);
            true
        });

        match victim {
            Some(victim) if published => {
                victim.update(|node| {
                    node.deleted = true;
                    true
                });
                Cursor::new(victim)
            }
            Some(victim) => {
                tracing::debug!("erase lost the splice, unlocking the victim");
                victim.update(|node| {
                    node.locked = false;
                    true
                });
                Cursor::end()
            }
            None => Cursor::end(),
        }
    }

    /// Erases the first element.
    ///
    /// Retries on contention, but returns the end cursor right away when
    /// the list is empty or its first element is locked.
    ///
    pub fn pop_front(&self) -> Cursor<T, N> {
        let head = self.begin();
        let backoff = Backoff::new();

        loop {
            let first = head.successor();
            if first.is_end() {
                return Cursor::end();
            }
            if first.is_locked() {
                tracing::debug!("pop_front refused, first element is locked");
                return Cursor::end();
            }

            let erased = self.erase_after_weak(&head);
            if !erased.is_end() {
                return erased;
            }
            backoff.snooze();
        }
    }

    /// Erases elements from the front until the list is empty.
    ///
    /// A locked first element may be an erase in flight, so it is waited
    /// on for a bounded number of backoff steps; if it stays locked (e.g.
    /// pinned), clearing stops there. Returns the number of erased nodes.
    ///
    pub fn clear(&self) -> usize {
        let head = self.begin();
        let backoff = Backoff::new();
        let mut erased = 0;

        loop {
            let first = head.successor();
            if first.is_end() {
                break;
            }

            if !self.erase_after_weak(&head).is_end() {
                erased += 1;
                backoff.reset();
                continue;
            }

            if first.is_locked() && backoff.is_completed() {
                break;
            }
            backoff.snooze();
        }

        tracing::debug!(erased, remaining = self.size(), "list cleared");
        erased
    }

    /// Clones of the element values, in list order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().filter_map(|cursor| cursor.value()).collect()
    }
}

impl<T: Clone, const N: usize> Default for AtomicList<T, N> {
    fn default() -> Self {
        AtomicList::new()
    }
}

impl<T: Clone + fmt::Debug, const N: usize> fmt::Debug for AtomicList<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a AtomicList<T, N> {
    type Item = Cursor<T, N>;
    type IntoIter = Iter<T, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type List = AtomicList<u32, 2>;

    fn list_of(values: &[u32]) -> List {
        let list = List::new();
        for value in values.iter().rev() {
            list.push_front(*value);
        }
        list
    }

    fn nth(list: &List, index: usize) -> Cursor<u32, 2> {
        list.iter().nth(index).unwrap()
    }

    #[test]
    fn test_new_list_is_empty() {
        let list = List::new();

        assert!(list.empty());
        assert_eq!(list.size(), 0);
        assert!(list.begin().successor().is_end());
        assert!(list.pop_front().is_end());
    }

    #[test]
    fn test_push_front_prepends() {
        let list = List::new();
        list.push_front(1);
        list.push_front(2);

        assert_eq!(list.to_vec(), vec![2, 1]);
        assert!(!list.empty());
        assert_eq!(format!("{list:?}"), "[2, 1]");
    }

    #[test]
    fn test_insert_after_links_between_neighbours() {
        let list = list_of(&[1, 3]);

        let inserted = list.insert_after_weak(&nth(&list, 0), 2);

        assert_eq!(inserted.value(), Some(2));
        assert_eq!(list.to_vec(), vec![1, 2, 3]);
        assert_eq!(inserted.successor().value(), Some(3));
    }

    #[test]
    fn test_insert_after_end_fails() {
        let list = list_of(&[1]);
        assert!(list.insert_after_weak(&list.end(), 2).is_end());
        assert_eq!(list.size(), 1);
    }

    #[test]
    fn test_erase_after_unlinks_and_flags_victim() {
        let list = list_of(&[1, 2, 3]);

        let erased = list.erase_after_weak(&nth(&list, 0));

        assert_eq!(erased.value(), Some(2));
        assert!(erased.is_locked());
        assert!(erased.is_deleted());
        assert_eq!(list.to_vec(), vec![1, 3]);

        // The erased node still points into the list, but is frozen.
        //
        assert_eq!(erased.successor().value(), Some(3));
        assert!(list.insert_after_weak(&erased, 9).is_end());
        assert!(list.erase_after_weak(&erased).is_end());
    }

    #[test]
    fn test_erase_after_last_fails() {
        let list = list_of(&[1]);
        assert!(list.erase_after_weak(&nth(&list, 0)).is_end());
        assert_eq!(list.size(), 1);
    }

    #[test]
    fn test_locked_node_is_frozen() {
        let list = list_of(&[1, 2, 3]);
        let pinned = nth(&list, 1);
        assert!(pinned.pin());

        // Not erasable, and nothing can be linked in after it.
        assert!(list.erase_after_weak(&nth(&list, 0)).is_end());
        assert!(list.insert_after_weak(&pinned, 7).is_end());
        assert!(list.erase_after_weak(&pinned).is_end());

        // Its predecessor can still grow.
        assert!(!list.insert_after_weak(&nth(&list, 0), 5).is_end());
        assert_eq!(list.to_vec(), vec![1, 5, 2, 3]);
    }

    #[test]
    fn test_pop_front_stops_at_locked_element() {
        let list = list_of(&[1, 2]);

        assert_eq!(list.pop_front().value(), Some(1));
        assert!(nth(&list, 0).pin());
        assert!(list.pop_front().is_end());
        assert_eq!(list.to_vec(), vec![2]);
    }

    #[test]
    fn test_clear_erases_everything_unpinned() {
        let list = list_of(&[1, 2, 3, 4]);
        assert_eq!(list.clear(), 4);
        assert!(list.empty());

        let list = list_of(&[1, 2, 3]);
        nth(&list, 1).pin();
        assert_eq!(list.clear(), 1);
        assert_eq!(list.to_vec(), vec![2, 3]);
    }

    #[test]
    fn test_cursor_outlives_list() {
        let list = list_of(&[1, 2]);
        let second = nth(&list, 1);
        drop(list);

        assert_eq!(second.value(), Some(2));
        assert!(second.successor().is_end());
    }

    #[test]
    fn test_drop_of_long_list_does_not_recurse() {
        let list = List::new();
        let mut tail = list.begin();
        for value in 0..50_000 {
            tail = list.insert_after_weak(&tail, value);
            assert!(!tail.is_end());
        }
        drop(tail);

        assert_eq!(list.size(), 50_000);
        drop(list);
    }

    #[test]
    fn test_first_cursor_held_across_drop_of_long_list() {
        let list = List::new();
        let mut tail = list.begin();
        for value in 0..200_000 {
            tail = list.insert_after_weak(&tail, value);
            assert!(!tail.is_end());
        }
        drop(tail);

        let first = list.begin().successor();
        drop(list);

        assert_eq!(first.value(), Some(0));
        assert_eq!(first.successor().value(), Some(1));
        drop(first);
    }
}
