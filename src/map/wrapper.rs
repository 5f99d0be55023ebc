use super::node::NodeLayout;
use crate::bytes::OffHeapByteArray;
use crate::memory::{Address, Slab};

/// Projects one payload out of a node, given only the node's address.
///
/// Eviction tokens are node addresses; these turn a token back into the
/// key to look up or the value to report.
pub trait NodeWrapper {
    fn wrap(&self, slab: &Slab, node: Address) -> OffHeapByteArray;
}

#[derive(Clone, Copy)]
pub struct KeyWrapper {
    nodes: &'static NodeLayout,
}

impl KeyWrapper {
    pub fn new(nodes: &'static NodeLayout) -> Self {
        KeyWrapper { nodes }
    }
}

impl NodeWrapper for KeyWrapper {
    fn wrap(&self, slab: &Slab, node: Address) -> OffHeapByteArray {
        self.nodes.key(slab, node)
    }
}

#[derive(Clone, Copy)]
pub struct ValueWrapper {
    nodes: &'static NodeLayout,
}

impl ValueWrapper {
    pub fn new(nodes: &'static NodeLayout) -> Self {
        ValueWrapper { nodes }
    }
}

impl NodeWrapper for ValueWrapper {
    fn wrap(&self, slab: &Slab, node: Address) -> OffHeapByteArray {
        self.nodes.value(slab, node)
    }
}
