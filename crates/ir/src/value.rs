//! Temporaries, constants and atoms.
use std::fmt;

use cranelift_entity::entity_impl;

use crate::IrType;

/// An opaque reference to a typed temporary of a [`crate::SuperBlock`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct Temp(pub u32);
entity_impl!(Temp, "t");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Const {
    U1(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Const {
    pub fn ty(self) -> IrType {
        match self {
            Self::U1(..) => IrType::I1,
            Self::U8(..) => IrType::I8,
            Self::U16(..) => IrType::I16,
            Self::U32(..) => IrType::I32,
            Self::U64(..) => IrType::I64,
        }
    }

    /// Builds a constant of the given integral type, truncating `value`.
    pub fn of_type(ty: IrType, value: u64) -> Self {
        match ty {
            IrType::I1 => Self::U1(value & 1 != 0),
            IrType::I8 => Self::U8(value as u8),
            IrType::I16 => Self::U16(value as u16),
            IrType::I32 => Self::U32(value as u32),
            IrType::I64 => Self::U64(value),
            _ => panic!("no constant representation for `{ty}`"),
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Self::U1(b) => b as u64,
            Self::U8(v) => v as u64,
            Self::U16(v) => v as u64,
            Self::U32(v) => v as u64,
            Self::U64(v) => v,
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U1(b) => write!(f, "{}:I1", *b as u8),
            _ => write!(f, "{:#x}:{}", self.as_u64(), self.ty()),
        }
    }
}

/// A flat operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atom {
    Tmp(Temp),
    Const(Const),
}

impl Atom {
    pub fn as_temp(self) -> Option<Temp> {
        match self {
            Self::Tmp(tmp) => Some(tmp),
            Self::Const(_) => None,
        }
    }

    pub fn as_const(self) -> Option<Const> {
        match self {
            Self::Const(c) => Some(c),
            Self::Tmp(_) => None,
        }
    }
}

impl From<Temp> for Atom {
    fn from(tmp: Temp) -> Self {
        Self::Tmp(tmp)
    }
}

impl From<Const> for Atom {
    fn from(c: Const) -> Self {
        Self::Const(c)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tmp(tmp) => write!(f, "{tmp}"),
            Self::Const(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_truncates_to_type() {
        assert_eq!(Const::of_type(IrType::I8, 0x1ff), Const::U8(0xff));
        assert_eq!(Const::of_type(IrType::I32, u64::MAX).as_u64(), 0xffff_ffff);
        assert_eq!(Const::of_type(IrType::I1, 2), Const::U1(false));
    }

    #[test]
    fn display() {
        assert_eq!(Atom::from(Temp(3)).to_string(), "t3");
        assert_eq!(format!("{:?}", Temp(3)), "t3");
        assert_eq!(Atom::from(Const::U64(0x4000)).to_string(), "0x4000:I64");
        assert_eq!(Const::U1(true).to_string(), "1:I1");
    }
}
