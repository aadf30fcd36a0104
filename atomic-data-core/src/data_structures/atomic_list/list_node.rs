use std::fmt;
use std::sync::Arc;

use crate::data_structures::AtomicData;

/// Container wrapping a single list node.
pub type AtomicNode<T, const N: usize> = AtomicData<ListNode<T, N>, N>;

/// Shared link to the following node.
pub(super) type Link<T, const N: usize> = Option<Arc<AtomicNode<T, N>>>;

/// Node of an [`AtomicList`](super::AtomicList).
///
/// Every node lives in its own [`AtomicData`], so the flags and the `next`
/// link change only through copy-update-publish. `value` is `None` for
/// the head sentinel alone.
///
#[derive(Clone)]
pub struct ListNode<T, const N: usize> {
    pub(super) locked: bool,
    pub(super) deleted: bool,
    pub(super) value: Option<T>,
    pub(super) next: Link<T, N>,
}

impl<T, const N: usize> ListNode<T, N> {
    pub(super) fn sentinel() -> Self {
        ListNode {
            locked: false,
            deleted: false,
            value: None,
            next: None,
        }
    }

    pub(super) fn new(value: T, next: Link<T, N>) -> Self {
        ListNode {
            locked: false,
            deleted: false,
            value: Some(value),
            next,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Payload access inside an update of the node's container.
    pub fn value_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Locked nodes refuse inserts after them and can't be erased.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Set once the node has been unlinked by an erase.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_sentinel(&self) -> bool {
        self.value.is_none()
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Whether new nodes may be linked in right after this one.
    #[inline]
    pub(super) fn accepts_successor(&self) -> bool {
        !self.locked && !self.deleted
    }
}

impl<T, const N: usize> Drop for ListNode<T, N> {
    fn drop(&mut self) {
        // Release the chain one node at a time. A node someone else still
        // holds (a cursor, another node, a pooled copy) ends the walk, and
        // its last holder picks it up from there.
        //
        let mut link = self.next.take();
        while let Some(node) = link {
            link = Arc::into_inner(node).and_then(|node| node.into_inner().next.take());
        }
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for ListNode<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `next` is printed as a flag, the chain behind it may be long.
        f.debug_struct("ListNode")
            .field("value", &self.value)
            .field("locked", &self.locked)
            .field("deleted", &self.deleted)
            .field("has_next", &self.has_next())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = ListNode<u32, 2>;

    #[test]
    fn test_sentinel_has_no_value() {
        let head = Node::sentinel();
        assert!(head.is_sentinel());
        assert!(head.value().is_none());
        assert!(head.accepts_successor());
    }

    #[test]
    fn test_locked_node_refuses_successors() {
        let mut node = Node::new(3, None);
        assert!(node.accepts_successor());

        node.locked = true;
        assert!(!node.accepts_successor());

        node.locked = false;
        node.deleted = true;
        assert!(!node.accepts_successor());
    }

    fn chain_of(length: u32) -> Arc<AtomicNode<u32, 2>> {
        let mut next = None;
        for value in (0..length).rev() {
            next = Some(Arc::new(AtomicData::new(Node::new(value, next))));
        }
        next.unwrap()
    }

    #[test]
    fn test_dropping_last_holder_of_long_chain() {
        let first = chain_of(100_000);
        assert_eq!(first.read(|node| node.value), Some(0));
        drop(first);
    }

    #[test]
    fn test_shared_tail_survives_drop_of_front() {
        let first = chain_of(1_000);

        let mut tail = Arc::clone(&first);
        for _ in 0..500 {
            tail = tail.read(|node| node.next.clone()).unwrap();
        }
        drop(first);

        assert_eq!(tail.read(|node| node.value), Some(500));
        let mut remaining = 1;
        let mut link = tail.read(|node| node.next.clone());
        while let Some(node) = link {
            remaining += 1;
            link = node.read(|node| node.next.clone());
        }
        assert_eq!(remaining, 500);
    }

    #[test]
    fn test_debug_does_not_follow_links() {
        let tail = Arc::new(AtomicData::new(Node::new(2, None)));
        let node = Node::new(1, Some(tail));

        assert_eq!(
            format!("{node:?}"),
            "ListNode { value: Some(1), locked: false, deleted: false, has_next: true }"
        );
    }
}
