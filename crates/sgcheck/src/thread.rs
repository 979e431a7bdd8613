use cranelift_entity::entity_impl;

use crate::{
    interner::StackBlockRef,
    interval::IntervalTree,
    query_cache::QueryCache,
    shadow_stack::ShadowStack,
};

/// A guest thread slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u32);
entity_impl!(ThreadId, "thread");

/// Payload of a caller block registered in a thread's stack tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackInterval {
    pub block: StackBlockRef,
    /// Depth of the activation that registered the block.
    pub depth: u32,
}

#[derive(Debug)]
pub struct ThreadState {
    pub stack: ShadowStack,
    pub tree: IntervalTree<StackInterval>,
    pub qcache: QueryCache,
}

impl ThreadState {
    pub fn new(qcache_size: usize) -> Self {
        Self {
            stack: ShadowStack::new(),
            tree: IntervalTree::new(),
            qcache: QueryCache::new(qcache_size),
        }
    }
}
