//! Text rendering of a [`SuperBlock`], used for trace logging and tests.
use std::io;

use crate::{Atom, Expr, MemEffectKind, Stmt, SuperBlock};

pub trait IrWrite {
    fn write(&self, sb: &SuperBlock, w: &mut dyn io::Write) -> io::Result<()>;

    fn dump_string(&self, sb: &SuperBlock) -> String {
        let mut s = Vec::new();
        // Writing into a `Vec` can't fail.
        let _ = self.write(sb, &mut s);
        String::from_utf8_lossy(&s).into_owned()
    }
}

impl IrWrite for Atom {
    fn write(&self, _sb: &SuperBlock, w: &mut dyn io::Write) -> io::Result<()> {
        write!(w, "{self}")
    }
}

impl IrWrite for Expr {
    fn write(&self, sb: &SuperBlock, w: &mut dyn io::Write) -> io::Result<()> {
        match self {
            Expr::Atom(atom) => atom.write(sb, w),
            Expr::Get { offset, ty } => write!(w, "GET:{ty}({offset})"),
            Expr::Load { endian, ty, addr } => write!(w, "LD{endian}:{ty}({addr})"),
            Expr::Unop { op, arg } => write!(w, "{op}({arg})"),
            Expr::Binop { op, lhs, rhs } => write!(w, "{op}({lhs},{rhs})"),
        }
    }
}

impl IrWrite for Stmt {
    fn write(&self, sb: &SuperBlock, w: &mut dyn io::Write) -> io::Result<()> {
        match self {
            Stmt::NoOp => write!(w, "IR-NoOp"),
            Stmt::IMark { addr, len, delta } => {
                write!(w, "------ IMark({addr:#x}, {len}, {delta}) ------")
            }
            Stmt::Put { offset, data } => write!(w, "PUT({offset}) = {data}"),
            Stmt::WrTmp { tmp, data } => {
                write!(w, "{tmp} = ")?;
                data.write(sb, w)
            }
            Stmt::Store { endian, addr, data } => write!(w, "ST{endian}({addr}) = {data}"),
            Stmt::Cas(cas) => write!(
                w,
                "{} = CAS{}({} :: {} -> {})",
                cas.old, cas.endian, cas.addr, cas.expected, cas.data
            ),
            Stmt::Dirty(dirty) => {
                write!(w, "DIRTY ")?;
                match dirty.guard {
                    Some(guard) => write!(w, "{guard}")?,
                    None => write!(w, "1:I1")?,
                }
                if let Some(fx) = &dirty.mem_fx {
                    let kind = match fx.kind {
                        MemEffectKind::Read => "RdFX",
                        MemEffectKind::Write => "WrFX",
                        MemEffectKind::Modify => "MoFX",
                    };
                    write!(w, " {kind}-gst({}, {})", fx.addr, fx.size)?;
                }
                write!(w, " ::: ")?;
                if let Some(result) = dirty.result {
                    write!(w, "{result} = ")?;
                }
                write!(w, "{}{{{:#x}}}(", dirty.callee.name, dirty.callee.addr)?;
                for (i, arg) in dirty.args.iter().enumerate() {
                    if i > 0 {
                        write!(w, ",")?;
                    }
                    write!(w, "{arg}")?;
                }
                write!(w, ")")
            }
            Stmt::MemFence => write!(w, "IR-MBusEvent-Fence"),
            Stmt::Exit {
                guard,
                jump_kind,
                dst,
                offs_ip,
            } => write!(
                w,
                "if ({guard}) {{ PUT({offs_ip}) = {dst}; exit-{} }}",
                jump_kind.as_text()
            ),
        }
    }
}

pub struct SuperBlockWriter<'a> {
    sb: &'a SuperBlock,
}

impl<'a> SuperBlockWriter<'a> {
    pub fn new(sb: &'a SuperBlock) -> Self {
        Self { sb }
    }

    pub fn write(&self, w: &mut dyn io::Write) -> io::Result<()> {
        writeln!(w, "IRSB {{")?;

        write!(w, "   ")?;
        for (i, (tmp, ty)) in self.sb.tyenv.iter().enumerate() {
            if i > 0 {
                write!(w, "   ")?;
            }
            write!(w, "{tmp}:{ty}")?;
        }
        writeln!(w)?;
        writeln!(w)?;

        for stmt in &self.sb.stmts {
            write!(w, "   ")?;
            stmt.write(self.sb, w)?;
            writeln!(w)?;
        }

        writeln!(
            w,
            "   PUT({}) = {}; exit-{}",
            self.sb.offs_ip,
            self.sb.next,
            self.sb.jump_kind.as_text()
        )?;
        writeln!(w, "}}")
    }

    pub fn dump_string(&self) -> String {
        let mut s = Vec::new();
        let _ = self.write(&mut s);
        String::from_utf8_lossy(&s).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use sgcheck_triple::Architecture;

    use super::*;
    use crate::{layout_for, Callee, Const, IrType, JumpKind, SuperBlockBuilder};

    #[test]
    fn write_block() {
        let layout = layout_for(Architecture::Amd64);
        let mut b = SuperBlockBuilder::new(layout);
        b.imark(0x4000, 4);
        let sp = b.load_sp();
        let v = b.load(IrType::I32, sp);
        b.store(sp, v);
        b.dirty_call(Callee::new("helper", 0x10), &[sp.into()])
            .unwrap();
        let sb = b.finish(Const::U64(0x4004), JumpKind::Call);

        let text = SuperBlockWriter::new(&sb).dump_string();
        insta::assert_snapshot!(text, @r"
        IRSB {
           t0:I64   t1:I32

           ------ IMark(0x4000, 4, 0) ------
           t0 = GET:I64(48)
           t1 = LDle:I32(t0)
           STle(t0) = t1
           DIRTY 1:I1 ::: helper{0x10}(t0)
           PUT(184) = 0x4004:I64; exit-Call
        }
        ");
    }

    #[test]
    fn write_exit() {
        let sb = SuperBlock::new(184);
        let stmt = Stmt::Exit {
            guard: Const::U1(true).into(),
            jump_kind: JumpKind::Boring,
            dst: Const::U64(0x5000),
            offs_ip: 184,
        };
        assert_eq!(
            stmt.dump_string(&sb),
            "if (1:I1) { PUT(184) = 0x5000:I64; exit-Boring }"
        );
    }
}
