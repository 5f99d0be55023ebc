//! Intrusive doubly-linked list for recency ordering.
//!
//! Links live inside the tracked records; the list only holds head, tail
//! and length. [`Links`] abstracts where the prev/next fields are stored so
//! the pointer patching can be exercised without a slab.
//!
//! Head is the most recently touched entry, tail the least.
use crate::memory::Address;

/// Storage for per-node prev/next links.
pub trait Links {
    fn next(&self, node: Address) -> Address;
    fn prev(&self, node: Address) -> Address;
    fn set_next(&mut self, node: Address, next: Address);
    fn set_prev(&mut self, node: Address, prev: Address);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecencyList {
    head: Address,
    tail: Address,
    len: usize,
}

impl Default for RecencyList {
    fn default() -> Self {
        RecencyList::new()
    }
}

impl RecencyList {
    pub const fn new() -> Self {
        RecencyList {
            head: Address::NONE,
            tail: Address::NONE,
            len: 0,
        }
    }

    pub fn head(&self) -> Address {
        self.head
    }

    pub fn tail(&self) -> Address {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `node` is linked into this list.
    ///
    /// Detached nodes always carry `NONE` in both links, so only the head
    /// has no predecessor.
    pub fn contains<L: Links>(&self, links: &L, node: Address) -> bool {
        !links.prev(node).is_none() || self.head == node
    }

    /// Insert a detached node at the head.
    pub fn push_head<L: Links>(&mut self, links: &mut L, node: Address) {
        debug_assert!(!self.contains(links, node), "{node:?} already linked");
        links.set_prev(node, Address::NONE);
        links.set_next(node, self.head);

        if self.head.is_none() {
            self.tail = node;
        } else {
            links.set_prev(self.head, node);
        }

        self.head = node;
        self.len += 1;
    }

    /// Unlink `node`, patching its neighbours and the endpoints.
    pub fn remove<L: Links>(&mut self, links: &mut L, node: Address) {
        assert!(self.len > 0, "remove of {node:?} from an empty recency list");
        let prev = links.prev(node);
        let next = links.next(node);

        if prev.is_none() {
            assert_eq!(self.head, node, "recency list corrupted at {node:?}");
            self.head = next;
        } else {
            links.set_next(prev, next);
        }

        if next.is_none() {
            assert_eq!(self.tail, node, "recency list corrupted at {node:?}");
            self.tail = prev;
        } else {
            links.set_prev(next, prev);
        }

        links.set_prev(node, Address::NONE);
        links.set_next(node, Address::NONE);
        self.len -= 1;
    }

    /// Touch: move `node` to the head.
    pub fn move_to_head<L: Links>(&mut self, links: &mut L, node: Address) {
        if self.head == node {
            return;
        }
        self.remove(links, node);
        self.push_head(links, node);
    }

    /// Detach and return the least recently touched node.
    pub fn pop_tail<L: Links>(&mut self, links: &mut L) -> Option<Address> {
        let tail = self.tail.some()?;
        self.remove(links, tail);
        Some(tail)
    }

    /// Nodes from head to tail.
    pub fn to_vec<L: Links>(&self, links: &L) -> Vec<Address> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while !cursor.is_none() {
            out.push(cursor);
            cursor = links.next(cursor);
        }
        out
    }
}
