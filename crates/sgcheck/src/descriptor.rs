//! Static descriptions of stack and global blocks as reported by debug info.
use smol_str::SmolStr;

use crate::Addr;

/// A block living in a stack frame, located relative to the stack or frame
/// pointer.
///
/// Blocks are ordered by `(base, size, sp_rel, is_vec, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackBlock {
    pub base: i64,
    pub size: u64,
    pub sp_rel: bool,
    pub is_vec: bool,
    pub name: SmolStr,
}

impl StackBlock {
    pub fn new(base: i64, size: u64, sp_rel: bool, is_vec: bool, name: impl Into<SmolStr>) -> Self {
        Self {
            base,
            size,
            sp_rel,
            is_vec,
            name: name.into(),
        }
    }

    /// An array located at `sp + base`.
    pub fn sp_array(base: i64, size: u64, name: impl Into<SmolStr>) -> Self {
        Self::new(base, size, true, true, name)
    }

    /// An array located at `fp + base`.
    pub fn fp_array(base: i64, size: u64, name: impl Into<SmolStr>) -> Self {
        Self::new(base, size, false, true, name)
    }

    /// Runtime address of the block for the given register values.
    pub fn effective_addr(&self, sp: Addr, fp: Addr) -> Addr {
        let reg = if self.sp_rel { sp } else { fp };
        reg.wrapping_add_signed(self.base)
    }
}

/// A block at a fixed address inside a loaded object.
///
/// Blocks are ordered by `(addr, size, is_vec, name, soname)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalBlock {
    pub addr: Addr,
    pub size: u64,
    pub is_vec: bool,
    pub name: SmolStr,
    pub soname: SmolStr,
}

impl GlobalBlock {
    pub fn new(
        addr: Addr,
        size: u64,
        is_vec: bool,
        name: impl Into<SmolStr>,
        soname: impl Into<SmolStr>,
    ) -> Self {
        Self {
            addr,
            size,
            is_vec,
            name: name.into(),
            soname: soname.into(),
        }
    }

    pub fn array(addr: Addr, size: u64, name: impl Into<SmolStr>, soname: impl Into<SmolStr>) -> Self {
        Self::new(addr, size, true, name, soname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_addr() {
        let a = StackBlock::sp_array(-16, 16, "a");
        let b = StackBlock::fp_array(8, 32, "b");
        assert_eq!(a.effective_addr(0x7ff0, 0x9000), 0x7fe0);
        assert_eq!(b.effective_addr(0x7ff0, 0x9000), 0x9008);
    }

    #[test]
    fn stack_block_order() {
        let a = StackBlock::sp_array(-16, 16, "a");
        let b = StackBlock::sp_array(-16, 32, "a");
        let c = StackBlock::fp_array(-8, 4, "c");
        let d = StackBlock::new(-8, 4, true, false, "c");
        assert!(a < b);
        assert!(b < c);
        // sp-relative sorts after fp-relative at the same base and size.
        assert!(c < d);
    }

    #[test]
    fn global_block_order() {
        let g1 = GlobalBlock::array(0x1000, 8, "x", "libx.so");
        let g2 = GlobalBlock::array(0x1000, 8, "x", "liby.so");
        let g3 = GlobalBlock::array(0x0fff, 64, "z", "libz.so");
        assert!(g1 < g2);
        assert!(g3 < g1);
    }
}
