use std::fmt;

use crate::{Atom, Endian, IrType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Atom(Atom),

    /// Read of a guest state slot.
    Get { offset: u32, ty: IrType },

    /// Read of guest memory.
    Load {
        endian: Endian,
        ty: IrType,
        addr: Atom,
    },

    Unop { op: UnOp, arg: Atom },

    Binop { op: BinOp, lhs: Atom, rhs: Atom },
}

impl Expr {
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Widen8Uto64,
    Widen16Uto64,
    Widen32Uto64,
    Widen32Sto64,
    Narrow64to32,
    Not32,
    Not64,
}

impl UnOp {
    pub fn result_ty(self) -> IrType {
        match self {
            Self::Widen8Uto64 | Self::Widen16Uto64 | Self::Widen32Uto64 | Self::Widen32Sto64 => {
                IrType::I64
            }
            Self::Not64 => IrType::I64,
            Self::Narrow64to32 | Self::Not32 => IrType::I32,
        }
    }

    pub fn as_text(self) -> &'static str {
        match self {
            Self::Widen8Uto64 => "8Uto64",
            Self::Widen16Uto64 => "16Uto64",
            Self::Widen32Uto64 => "32Uto64",
            Self::Widen32Sto64 => "32Sto64",
            Self::Narrow64to32 => "64to32",
            Self::Not32 => "Not32",
            Self::Not64 => "Not64",
        }
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add32,
    Add64,
    Sub32,
    Sub64,
    And64,
    Or64,
    Xor64,
    Shl64,
    CmpEq64,
    CmpLtU64,
}

impl BinOp {
    pub fn result_ty(self) -> IrType {
        match self {
            Self::Add32 | Self::Sub32 => IrType::I32,
            Self::Add64 | Self::Sub64 | Self::And64 | Self::Or64 | Self::Xor64 | Self::Shl64 => {
                IrType::I64
            }
            Self::CmpEq64 | Self::CmpLtU64 => IrType::I1,
        }
    }

    pub fn as_text(self) -> &'static str {
        match self {
            Self::Add32 => "Add32",
            Self::Add64 => "Add64",
            Self::Sub32 => "Sub32",
            Self::Sub64 => "Sub64",
            Self::And64 => "And64",
            Self::Or64 => "Or64",
            Self::Xor64 => "Xor64",
            Self::Shl64 => "Shl64",
            Self::CmpEq64 => "CmpEQ64",
            Self::CmpLtU64 => "CmpLT64U",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}
