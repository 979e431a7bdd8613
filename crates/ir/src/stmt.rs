use smallvec::SmallVec;

use crate::{Addr, Atom, Const, Endian, Expr, Temp};

/// Helper calls take at most this many host-word arguments.
pub const MAX_DIRTY_ARGS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    NoOp,

    /// Marks the start of the statements belonging to the guest instruction
    /// at `addr`, `len` bytes long.
    IMark { addr: Addr, len: u32, delta: u8 },

    /// Write of a guest state slot.
    Put { offset: u32, data: Atom },

    WrTmp { tmp: Temp, data: Expr },

    Store {
        endian: Endian,
        addr: Atom,
        data: Atom,
    },

    Cas(Box<Cas>),

    Dirty(Box<DirtyCall>),

    MemFence,

    /// Conditional side exit.
    Exit {
        guard: Atom,
        jump_kind: JumpKind,
        dst: Const,
        offs_ip: u32,
    },
}

impl Stmt {
    pub fn is_imark(&self) -> bool {
        matches!(self, Self::IMark { .. })
    }

    /// Returns `true` if the statement touches guest memory.
    pub fn references_memory(&self) -> bool {
        match self {
            Self::WrTmp { data, .. } => data.is_load(),
            Self::Store { .. } | Self::Cas(..) => true,
            Self::Dirty(dirty) => dirty.mem_fx.is_some(),
            _ => false,
        }
    }
}

/// Atomic compare-and-swap: `old = *addr; if old == expected { *addr = data }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cas {
    pub old: Temp,
    pub endian: Endian,
    pub addr: Atom,
    pub expected: Atom,
    pub data: Atom,
}

/// Target of a dirty helper call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Callee {
    pub name: &'static str,
    pub addr: Addr,
}

impl Callee {
    pub fn new(name: &'static str, addr: Addr) -> Self {
        Self { name, addr }
    }
}

/// A call to an external helper with side effects the IR can't see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyCall {
    pub callee: Callee,
    pub guard: Option<Atom>,
    pub args: SmallVec<[Atom; MAX_DIRTY_ARGS]>,
    pub result: Option<Temp>,
    pub mem_fx: Option<MemEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemEffect {
    pub kind: MemEffectKind,
    pub addr: Atom,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemEffectKind {
    Read,
    Write,
    Modify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JumpKind {
    #[default]
    Boring,
    Call,
    Ret,
    Syscall,
    NoDecode,
    SigTrap,
}

impl JumpKind {
    pub fn as_text(self) -> &'static str {
        match self {
            Self::Boring => "Boring",
            Self::Call => "Call",
            Self::Ret => "Return",
            Self::Syscall => "Syscall",
            Self::NoDecode => "NoDecode",
            Self::SigTrap => "SigTRAP",
        }
    }
}
