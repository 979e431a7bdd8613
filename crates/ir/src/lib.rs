//! Flat guest IR for one translation unit (a superblock of guest code).
//!
//! Every operand is an [`Atom`]: either a temporary or a constant. Memory
//! references can therefore only appear as [`Expr::Load`], [`Stmt::Store`],
//! [`Stmt::Cas`] or the memory effect of a [`Stmt::Dirty`] call.
pub mod builder;
pub mod expr;
pub mod ir_writer;
pub mod isa;
pub mod stmt;
pub mod super_block;
pub mod types;
pub mod value;

pub use builder::{BuildError, SuperBlockBuilder};
pub use expr::{BinOp, Expr, UnOp};
pub use isa::{layout_for, GuestLayout};
pub use stmt::{
    Callee, Cas, DirtyCall, JumpKind, MemEffect, MemEffectKind, Stmt, MAX_DIRTY_ARGS,
};
pub use super_block::SuperBlock;
pub use types::{Endian, IrType};
pub use value::{Atom, Const, Temp};

pub type Addr = u64;
