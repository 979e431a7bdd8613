//! This module contains the superblock: a single-entry, multiple-exit run of
//! guest instructions in flat IR.
use cranelift_entity::PrimaryMap;

use crate::{Atom, Const, Expr, IrType, JumpKind, Stmt, Temp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub tyenv: PrimaryMap<Temp, IrType>,
    pub stmts: Vec<Stmt>,
    /// Where control goes when the end of the block is reached.
    pub next: Atom,
    pub jump_kind: JumpKind,
    /// Guest state offset of the instruction pointer.
    pub offs_ip: u32,
}

impl SuperBlock {
    pub fn new(offs_ip: u32) -> Self {
        Self {
            tyenv: PrimaryMap::new(),
            stmts: Vec::new(),
            next: Atom::Const(Const::U64(0)),
            jump_kind: JumpKind::Boring,
            offs_ip,
        }
    }

    /// Copies everything except the statement list. Temporaries stay valid in
    /// the copy.
    pub fn copy_except_stmts(&self) -> Self {
        Self {
            tyenv: self.tyenv.clone(),
            stmts: Vec::with_capacity(self.stmts.len()),
            next: self.next,
            jump_kind: self.jump_kind,
            offs_ip: self.offs_ip,
        }
    }

    pub fn new_temp(&mut self, ty: IrType) -> Temp {
        self.tyenv.push(ty)
    }

    pub fn temp_ty(&self, tmp: Temp) -> IrType {
        self.tyenv[tmp]
    }

    pub fn atom_ty(&self, atom: Atom) -> IrType {
        match atom {
            Atom::Tmp(tmp) => self.temp_ty(tmp),
            Atom::Const(c) => c.ty(),
        }
    }

    pub fn expr_ty(&self, expr: &Expr) -> IrType {
        match expr {
            Expr::Atom(atom) => self.atom_ty(*atom),
            Expr::Get { ty, .. } | Expr::Load { ty, .. } => *ty,
            Expr::Unop { op, .. } => op.result_ty(),
            Expr::Binop { op, .. } => op.result_ty(),
        }
    }

    /// Guest instruction addresses in the order they appear.
    pub fn guest_addrs(&self) -> impl Iterator<Item = u64> + '_ {
        self.stmts.iter().filter_map(|stmt| match stmt {
            Stmt::IMark { addr, .. } => Some(*addr),
            _ => None,
        })
    }

    /// Returns the last `IMark` of the block, i.e. the instruction the block
    /// exit belongs to.
    pub fn last_imark(&self) -> Option<(u64, u32, u8)> {
        self.stmts.iter().rev().find_map(|stmt| match stmt {
            Stmt::IMark { addr, len, delta } => Some((*addr, *len, *delta)),
            _ => None,
        })
    }

    pub fn ends_in_call(&self) -> bool {
        self.jump_kind == JumpKind::Call
    }
}
