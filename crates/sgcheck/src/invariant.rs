//! What an instruction instance has learned about the memory it touches.
use std::fmt;

use crate::{
    interner::{DescriptorCache, GlobalBlockRef, StackBlockRef, StackVecRef},
    interval::{range_contains, IntervalTree, NodeId},
    query_cache::QueryCache,
    stats::Stats,
    thread::StackInterval,
    Addr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Invariant {
    /// No access has been seen yet.
    #[default]
    Unset,
    Unknown,
    /// A block of the instruction's own frame.
    Stack0 {
        addr: Addr,
        size: u64,
        block: StackBlockRef,
    },
    /// A block registered by a caller `depth` activations from the bottom.
    StackN {
        node: NodeId,
        addr: Addr,
        size: u64,
        block: StackBlockRef,
        depth: u32,
    },
    Global {
        node: NodeId,
        addr: Addr,
        size: u64,
        block: GlobalBlockRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    Unset,
    Unknown,
    Stack0,
    StackN,
    Global,
}

impl Invariant {
    pub fn kind(&self) -> InvariantKind {
        match self {
            Self::Unset => InvariantKind::Unset,
            Self::Unknown => InvariantKind::Unknown,
            Self::Stack0 { .. } => InvariantKind::Stack0,
            Self::StackN { .. } => InvariantKind::StackN,
            Self::Global { .. } => InvariantKind::Global,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Whether a fresh classification confirms this learned invariant.
    ///
    /// `Stack0` compares the block's address range, the other block kinds
    /// compare tree nodes.
    pub fn agrees_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) | (Self::Unknown, Self::Unknown) => true,
            (
                Self::Stack0 { addr, size, .. },
                Self::Stack0 {
                    addr: other_addr,
                    size: other_size,
                    ..
                },
            ) => addr == other_addr && size == other_size,
            (Self::StackN { node, .. }, Self::StackN { node: other, .. })
            | (Self::Global { node, .. }, Self::Global { node: other, .. }) => node == other,
            _ => false,
        }
    }

    /// The address range the invariant denotes, if any.
    pub fn range(&self) -> Option<(Addr, u64)> {
        match *self {
            Self::Stack0 { addr, size, .. }
            | Self::StackN { addr, size, .. }
            | Self::Global { addr, size, .. } => Some((addr, size)),
            Self::Unset | Self::Unknown => None,
        }
    }

    pub fn global_node(&self) -> Option<NodeId> {
        match *self {
            Self::Global { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Renders the invariant as seen from an activation at `current_depth`.
    pub fn display<'a>(
        &'a self,
        descriptors: &'a DescriptorCache,
        current_depth: u32,
    ) -> DisplayInvariant<'a> {
        DisplayInvariant {
            inv: self,
            descriptors,
            current_depth,
        }
    }
}

pub struct DisplayInvariant<'a> {
    inv: &'a Invariant,
    descriptors: &'a DescriptorCache,
    current_depth: u32,
}

impl fmt::Display for DisplayInvariant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.inv {
            Invariant::Unset => write!(f, "unset"),
            Invariant::Unknown => write!(f, "unknown"),
            Invariant::Stack0 { size, block, .. } => {
                let block = self.descriptors.stack_block(block);
                write!(
                    f,
                    "stack {} \"{}\" of size {size} in this frame",
                    noun(block.is_vec),
                    block.name
                )
            }
            Invariant::StackN {
                size, block, depth, ..
            } => {
                let block = self.descriptors.stack_block(block);
                write!(
                    f,
                    "stack {} \"{}\" of size {size} in frame {} back from here",
                    noun(block.is_vec),
                    block.name,
                    self.current_depth.saturating_sub(depth)
                )
            }
            Invariant::Global { size, block, .. } => {
                let block = self.descriptors.global_block(block);
                write!(
                    f,
                    "global {} \"{}\" of size {size} in object with soname \"{}\"",
                    noun(block.is_vec),
                    block.name,
                    block.soname
                )
            }
        }
    }
}

fn noun(is_vec: bool) -> &'static str {
    if is_vec {
        "array"
    } else {
        "non-array"
    }
}

/// A memory access as seen by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct Access {
    pub ea: Addr,
    pub size: u64,
    pub sp: Addr,
    pub fp: Addr,
}

/// Everything classification reads.
pub(crate) struct Classifier<'a> {
    pub descriptors: &'a DescriptorCache,
    pub stack_tree: &'a IntervalTree<StackInterval>,
    pub globals: &'a IntervalTree<GlobalBlockRef>,
}

impl Classifier<'_> {
    pub(crate) fn classify(
        &self,
        qcache: &mut QueryCache,
        stats: &mut Stats,
        access: Access,
        vector: StackVecRef,
    ) -> Invariant {
        let Access { ea, size, sp, fp } = access;

        let blocks = self.descriptors.stack_vector(vector);
        for (i, block) in blocks.iter().enumerate() {
            let bea = block.effective_addr(sp, fp);
            if range_contains(bea, block.size, ea, size) {
                return Invariant::Stack0 {
                    addr: bea,
                    size: block.size,
                    block: StackBlockRef::new(vector, i),
                };
            }
        }

        stats.qcache_queries += 1;
        let hit = match qcache.lookup(ea) {
            Some(hit) => Some(hit),
            None => {
                stats.qcache_misses += 1;
                let found = self
                    .stack_tree
                    .find_covering(ea)
                    .map(|e| (e.interval, e.id, *e.value));
                if let Some(found) = found {
                    qcache.insert(found);
                }
                found
            }
        };
        if let Some((interval, node, value)) = hit {
            if interval.contains(ea, size) {
                return Invariant::StackN {
                    node,
                    addr: interval.addr(),
                    size: interval.size(),
                    block: value.block,
                    depth: value.depth,
                };
            }
        }

        if let Some(entry) = self.globals.find_covering(ea) {
            if entry.interval.contains(ea, size) {
                return Invariant::Global {
                    node: entry.id,
                    addr: entry.interval.addr(),
                    size: entry.interval.size(),
                    block: *entry.value,
                };
            }
        }

        Invariant::Unknown
    }
}
