//! Canonical copies of stack block vectors and global blocks.
//!
//! Every vector or global handed out by [`DescriptorCache`] stays valid for
//! the life of the cache, so handles can be compared by identity.
use std::hash::Hash;

use cranelift_entity::{entity_impl, EntityRef, PrimaryMap};
use rustc_hash::FxHashMap;

use crate::descriptor::{GlobalBlock, StackBlock};

/// Handle of an interned stack block vector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackVecRef(u32);
entity_impl!(StackVecRef, "blocks");

/// Handle of an interned global block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalBlockRef(u32);
entity_impl!(GlobalBlockRef, "global");

/// One element of an interned stack block vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackBlockRef {
    pub vector: StackVecRef,
    pub index: u32,
}

impl StackBlockRef {
    pub fn new(vector: StackVecRef, index: usize) -> Self {
        Self {
            vector,
            index: index as u32,
        }
    }
}

#[derive(Debug)]
struct Interner<K, V>
where
    K: EntityRef,
{
    map: FxHashMap<V, K>,
    store: PrimaryMap<K, V>,
}

impl<K, V> Interner<K, V>
where
    K: EntityRef,
    V: Eq + Hash + Clone,
{
    fn intern(&mut self, value: V) -> K {
        if let Some(&key) = self.map.get(&value) {
            key
        } else {
            let key = self.store.push(value.clone());
            self.map.insert(value, key);
            key
        }
    }

    fn get(&self, key: K) -> &V {
        &self.store[key]
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

impl<K, V> Default for Interner<K, V>
where
    K: EntityRef,
{
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            store: PrimaryMap::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DescriptorCache {
    stack_vecs: Interner<StackVecRef, Vec<StackBlock>>,
    globals: Interner<GlobalBlockRef, GlobalBlock>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops zero sized blocks, keeps only the largest of the blocks sharing
    /// both a base and an addressing register, sorts the rest and returns the
    /// canonical handle for the result.
    pub fn intern_stack_vector(&mut self, mut blocks: Vec<StackBlock>) -> StackVecRef {
        blocks.retain(|b| b.size > 0);
        blocks.sort_by(|a, b| {
            (a.base, a.sp_rel)
                .cmp(&(b.base, b.sp_rel))
                .then_with(|| b.size.cmp(&a.size))
                .then_with(|| a.cmp(b))
        });
        blocks.dedup_by(|later, kept| later.base == kept.base && later.sp_rel == kept.sp_rel);
        blocks.sort();
        blocks.shrink_to_fit();
        self.stack_vecs.intern(blocks)
    }

    pub fn intern_global_block(&mut self, block: GlobalBlock) -> GlobalBlockRef {
        self.globals.intern(block)
    }

    pub fn stack_vector(&self, vector: StackVecRef) -> &[StackBlock] {
        self.stack_vecs.get(vector)
    }

    pub fn stack_block(&self, block: StackBlockRef) -> &StackBlock {
        &self.stack_vector(block.vector)[block.index as usize]
    }

    pub fn global_block(&self, block: GlobalBlockRef) -> &GlobalBlock {
        self.globals.get(block)
    }

    pub fn num_stack_vectors(&self) -> usize {
        self.stack_vecs.len()
    }

    pub fn num_global_blocks(&self) -> usize {
        self.globals.len()
    }
}
