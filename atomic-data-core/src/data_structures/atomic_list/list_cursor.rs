use std::fmt;
use std::sync::Arc;

use crossbeam_utils::Backoff;

use super::list_node::{AtomicNode, ListNode};
use crate::data_structures::{DEFAULT_BUDGET, UpdateFailure};

/// Position in an [`AtomicList`](super::AtomicList).
///
/// A cursor holds a strong reference to its node, so the node stays
/// readable after it has been erased from the list. The end cursor holds
/// nothing. Cursors compare by node identity.
///
pub struct Cursor<T, const N: usize = DEFAULT_BUDGET> {
    pub(super) node: Option<Arc<AtomicNode<T, N>>>,
}

impl<T, const N: usize> Cursor<T, N> {
    pub(super) fn new(node: Arc<AtomicNode<T, N>>) -> Self {
        Cursor { node: Some(node) }
    }

    /// The cursor past the last node.
    pub fn end() -> Self {
        Cursor { node: None }
    }

    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Container of the node, `None` for the end cursor.
    pub fn node(&self) -> Option<&AtomicNode<T, N>> {
        self.node.as_deref()
    }

    /// Invokes `visitor` on the node's current state.
    pub fn read<R>(&self, visitor: impl FnOnce(&ListNode<T, N>) -> R) -> Option<R> {
        self.node.as_ref().map(|node| node.read(visitor))
    }

    /// Cursor to the following node as currently linked.
    pub fn successor(&self) -> Self {
        Cursor {
            node: self.read(|node| node.next.clone()).flatten(),
        }
    }

    /// Moves to the following node.
    pub fn advance(&mut self) {
        *self = self.successor();
    }

    pub fn is_locked(&self) -> bool {
        self.read(ListNode::is_locked).unwrap_or(false)
    }

    pub fn is_deleted(&self) -> bool {
        self.read(ListNode::is_deleted).unwrap_or(false)
    }
}

impl<T: Clone, const N: usize> Cursor<T, N> {
    /// Clone of the node's value, `None` for the sentinel and the end.
    pub fn value(&self) -> Option<T> {
        self.read(|node| node.value.clone()).flatten()
    }

    /// Locks the node for good, without unlinking it.
    ///
    /// A pinned node can't be erased and nothing can be inserted after
    /// it, which is what a deletion stuck between its two phases looks
    /// like to other threads. Returns `false` for the end cursor, the head
    /// sentinel, and nodes that are already locked.
    ///
    pub fn pin(&self) -> bool {
        let Some(node) = self.node.as_deref() else {
            return false;
        };

        let backoff = Backoff::new();
        loop {
            let attempt = node.try_update(|node| {
                if node.locked || node.is_sentinel() {
                    return false;
                }
                node.locked = true;
                true
            });

            match attempt {
                Ok(()) => return true,
                Err(UpdateFailure::Declined) => return false,
                Err(_) => backoff.snooze(),
            }
        }
    }
}

impl<T, const N: usize> Clone for Cursor<T, N> {
    fn clone(&self) -> Self {
        Cursor {
            node: self.node.clone(),
        }
    }
}

impl<T, const N: usize> Default for Cursor<T, N> {
    fn default() -> Self {
        Cursor::end()
    }
}

impl<T, const N: usize> PartialEq for Cursor<T, N> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.node, &other.node) {
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T, const N: usize> Eq for Cursor<T, N> {}

impl<T: fmt::Debug, const N: usize> fmt::Debug for Cursor<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => node.read(|node| f.debug_tuple("Cursor").field(node).finish()),
            None => f.write_str("Cursor(end)"),
        }
    }
}

/// Iterator over the element nodes of a list, head excluded.
pub struct Iter<T, const N: usize = DEFAULT_BUDGET> {
    position: Cursor<T, N>,
}

impl<T, const N: usize> Iter<T, N> {
    pub(super) fn new(head: Cursor<T, N>) -> Self {
        Iter { position: head }
    }
}

impl<T, const N: usize> Iterator for Iter<T, N> {
    type Item = Cursor<T, N>;

    fn next(&mut self) -> Option<Self::Item> {
        self.position.advance();
        if self.position.is_end() {
            None
        } else {
            Some(self.position.clone())
        }
    }
}
