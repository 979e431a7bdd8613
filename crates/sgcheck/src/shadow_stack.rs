//! Per-thread stack of activations mirroring the guest call stack.
use smallvec::SmallVec;

use crate::{instance::InstanceTable, Addr};

#[derive(Debug, Clone)]
pub struct Activation {
    /// SP right after the call that created this activation. It is popped
    /// once SP rises above this value.
    pub creation_sp: Addr,
    pub sp_at_call: Addr,
    pub fp_at_call: Addr,
    pub ret_addr: Addr,
    /// Addresses of the blocks this activation registered in the stack tree
    /// on its outstanding call.
    pub blocks_added_by_call: SmallVec<[Addr; 4]>,
    pub instances: InstanceTable,
}

impl Activation {
    pub fn new(creation_sp: Addr, ret_addr: Addr) -> Self {
        Self {
            creation_sp,
            sp_at_call: 0,
            fp_at_call: 0,
            ret_addr,
            blocks_added_by_call: SmallVec::new(),
            instances: InstanceTable::new(),
        }
    }

    fn sentinel() -> Self {
        Self::new(Addr::MAX, 0)
    }

    pub fn is_sentinel(&self) -> bool {
        self.creation_sp == Addr::MAX
    }
}

/// Always holds the sentinel activation at index 0. The depth of an
/// activation is its index.
#[derive(Debug, Clone)]
pub struct ShadowStack {
    frames: Vec<Activation>,
}

impl Default for ShadowStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Activation::sentinel()],
        }
    }

    /// Depth of the innermost activation.
    pub fn depth(&self) -> u32 {
        (self.frames.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> &Activation {
        &self.frames[self.frames.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut Activation {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn push(&mut self, activation: Activation) {
        self.frames.push(activation);
    }

    /// # Panics
    /// When only the sentinel is left.
    pub fn pop(&mut self) -> Activation {
        assert!(self.frames.len() > 1, "attempt to pop the sentinel activation");
        match self.frames.pop() {
            Some(activation) => activation,
            None => unreachable!(),
        }
    }

    pub fn get(&self, depth: u32) -> Option<&Activation> {
        self.frames.get(depth as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activation> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Activation> {
        self.frames.iter_mut()
    }
}
