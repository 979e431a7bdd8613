//! Helper constructors used by decoders and instrumentation passes to append
//! statements to a [`SuperBlock`].
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    Addr, Atom, BinOp, Callee, Cas, Const, DirtyCall, Expr, GuestLayout, IrType, JumpKind,
    MemEffect, Stmt, SuperBlock, Temp, UnOp, MAX_DIRTY_ARGS,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("dirty call to `{callee}` takes {given} arguments, at most 6 are allowed")]
    TooManyDirtyArgs { callee: &'static str, given: usize },

    #[error("dirty call argument of type `{0}` is not a host word")]
    NotHostWord(IrType),
}

pub struct SuperBlockBuilder<'a> {
    sb: SuperBlock,
    layout: &'a dyn GuestLayout,
}

impl<'a> SuperBlockBuilder<'a> {
    pub fn new(layout: &'a dyn GuestLayout) -> Self {
        Self {
            sb: SuperBlock::new(layout.offset_ip()),
            layout,
        }
    }

    /// Starts from `template` with its temporaries but no statements.
    pub fn from_template(template: &SuperBlock, layout: &'a dyn GuestLayout) -> Self {
        Self {
            sb: template.copy_except_stmts(),
            layout,
        }
    }

    pub fn layout(&self) -> &'a dyn GuestLayout {
        self.layout
    }

    pub fn sb(&self) -> &SuperBlock {
        &self.sb
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.sb.stmts.push(stmt);
    }

    pub fn new_temp(&mut self, ty: IrType) -> Temp {
        self.sb.new_temp(ty)
    }

    pub fn imark(&mut self, addr: Addr, len: u32) {
        self.push(Stmt::IMark {
            addr,
            len,
            delta: 0,
        });
    }

    pub fn word_const(&self, value: u64) -> Atom {
        Const::of_type(self.layout.word_ty(), value).into()
    }

    pub fn assign(&mut self, ty: IrType, data: Expr) -> Temp {
        let tmp = self.new_temp(ty);
        self.push(Stmt::WrTmp { tmp, data });
        tmp
    }

    pub fn get(&mut self, offset: u32, ty: IrType) -> Temp {
        self.assign(ty, Expr::Get { offset, ty })
    }

    /// Loads one word-sized guest state slot.
    pub fn get_slot(&mut self, offset: u32) -> Temp {
        let ty = self.layout.word_ty();
        self.get(offset, ty)
    }

    /// Loads the low `ty`-sized part of the word-sized slot at `offset`.
    pub fn get_sub_slot(&mut self, offset: u32, ty: IrType) -> Temp {
        let word_size = self.layout.word_ty().size_of();
        let offset = self.layout.sub_slot_offset(offset, word_size, ty.size_of());
        self.get(offset, ty)
    }

    pub fn load_sp(&mut self) -> Temp {
        self.get_slot(self.layout.offset_sp())
    }

    pub fn load_fp(&mut self) -> Temp {
        self.get_slot(self.layout.offset_fp())
    }

    pub fn load(&mut self, ty: IrType, addr: impl Into<Atom>) -> Temp {
        let endian = self.layout.endian();
        self.assign(
            ty,
            Expr::Load {
                endian,
                ty,
                addr: addr.into(),
            },
        )
    }

    pub fn store(&mut self, addr: impl Into<Atom>, data: impl Into<Atom>) {
        let endian = self.layout.endian();
        self.push(Stmt::Store {
            endian,
            addr: addr.into(),
            data: data.into(),
        });
    }

    pub fn cas(
        &mut self,
        addr: impl Into<Atom>,
        expected: impl Into<Atom>,
        data: impl Into<Atom>,
    ) -> Temp {
        let expected = expected.into();
        let old = self.new_temp(self.sb.atom_ty(expected));
        let endian = self.layout.endian();
        self.push(Stmt::Cas(Box::new(Cas {
            old,
            endian,
            addr: addr.into(),
            expected,
            data: data.into(),
        })));
        old
    }

    pub fn put(&mut self, offset: u32, data: impl Into<Atom>) {
        self.push(Stmt::Put {
            offset,
            data: data.into(),
        });
    }

    pub fn unop(&mut self, op: UnOp, arg: impl Into<Atom>) -> Temp {
        self.assign(
            op.result_ty(),
            Expr::Unop {
                op,
                arg: arg.into(),
            },
        )
    }

    pub fn binop(&mut self, op: BinOp, lhs: impl Into<Atom>, rhs: impl Into<Atom>) -> Temp {
        self.assign(
            op.result_ty(),
            Expr::Binop {
                op,
                lhs: lhs.into(),
                rhs: rhs.into(),
            },
        )
    }

    /// Zero-extends `atom` to a 64-bit host word if it is narrower.
    pub fn widen_to_host_word(&mut self, atom: Atom) -> Result<Atom, BuildError> {
        let op = match self.sb.atom_ty(atom) {
            IrType::I64 => return Ok(atom),
            IrType::I32 => UnOp::Widen32Uto64,
            IrType::I16 => UnOp::Widen16Uto64,
            IrType::I8 => UnOp::Widen8Uto64,
            ty => return Err(BuildError::NotHostWord(ty)),
        };

        if let Atom::Const(c) = atom {
            return Ok(Const::U64(c.as_u64()).into());
        }
        Ok(self.unop(op, atom).into())
    }

    /// Appends an unconditional call to `callee` with host-word `args`.
    pub fn dirty_call(&mut self, callee: Callee, args: &[Atom]) -> Result<(), BuildError> {
        self.dirty_call_with(callee, args, None)
    }

    pub fn dirty_call_with(
        &mut self,
        callee: Callee,
        args: &[Atom],
        mem_fx: Option<MemEffect>,
    ) -> Result<(), BuildError> {
        if args.len() > MAX_DIRTY_ARGS {
            return Err(BuildError::TooManyDirtyArgs {
                callee: callee.name,
                given: args.len(),
            });
        }

        let args = args
            .iter()
            .map(|arg| self.widen_to_host_word(*arg))
            .collect::<Result<SmallVec<_>, _>>()?;

        self.push(Stmt::Dirty(Box::new(DirtyCall {
            callee,
            guard: None,
            args,
            result: None,
            mem_fx,
        })));
        Ok(())
    }

    pub fn exit(&mut self, guard: impl Into<Atom>, jump_kind: JumpKind, dst: Addr) {
        let dst = Const::of_type(self.layout.word_ty(), dst);
        let offs_ip = self.sb.offs_ip;
        self.push(Stmt::Exit {
            guard: guard.into(),
            jump_kind,
            dst,
            offs_ip,
        });
    }

    pub fn finish(mut self, next: impl Into<Atom>, jump_kind: JumpKind) -> SuperBlock {
        self.sb.next = next.into();
        self.sb.jump_kind = jump_kind;
        self.sb
    }

    /// Finishes keeping the `next`/`jump_kind` the block was created with.
    pub fn finish_as_is(self) -> SuperBlock {
        self.sb
    }
}
