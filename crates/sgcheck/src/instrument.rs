//! Instrumentation pass: inserts calls to the runtime hooks into a
//! superblock of guest code.
use cranelift_entity::EntityRef;
use sgcheck_ir::{
    ir_writer::SuperBlockWriter, Atom, Callee, Const, Expr, GuestLayout, MemEffectKind, Stmt,
    SuperBlock, SuperBlockBuilder,
};
use tracing::trace;

use crate::{
    checker::Checker, diagnostic::AccessKind, error::InstrumentError, interner::StackVecRef,
    runtime, Addr,
};

/// Longest code window a layout may ask for when recognising epilogues.
const MAX_EPILOGUE_WINDOW: usize = 16;

/// Helpers the instrumented code calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperCallees {
    /// `(ea, sp, fp, signed_size, ip, vector)`
    pub memory_access: Callee,
    /// `(sp_after_call, fp, ret_addr, vector, sp_adjust)`
    pub call: Callee,
}

impl Default for HelperCallees {
    fn default() -> Self {
        runtime::helper_callees()
    }
}

/// Instruments `sb` with calls into the process-wide runtime.
pub fn instrument(
    checker: &mut Checker,
    sb: &SuperBlock,
    layout: &dyn GuestLayout,
) -> Result<SuperBlock, InstrumentError> {
    instrument_with(checker, sb, layout, HelperCallees::default())
}

/// A memory reference made by one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemRef {
    addr: Atom,
    size: u32,
    kind: AccessKind,
}

impl MemRef {
    fn signed_size(&self) -> i64 {
        match self.kind {
            AccessKind::Read => i64::from(self.size),
            AccessKind::Write => -i64::from(self.size),
        }
    }
}

fn memory_ref(sb: &SuperBlock, stmt: &Stmt) -> Option<MemRef> {
    match stmt {
        Stmt::WrTmp {
            data: Expr::Load { ty, addr, .. },
            ..
        } => Some(MemRef {
            addr: *addr,
            size: ty.size_of(),
            kind: AccessKind::Read,
        }),
        Stmt::Store { addr, data, .. } => Some(MemRef {
            addr: *addr,
            size: sb.atom_ty(*data).size_of(),
            kind: AccessKind::Write,
        }),
        // Only the load half is checked.
        Stmt::Cas(cas) => Some(MemRef {
            addr: cas.addr,
            size: sb.atom_ty(cas.expected).size_of(),
            kind: AccessKind::Read,
        }),
        Stmt::Dirty(dirty) => dirty.mem_fx.map(|fx| MemRef {
            addr: fx.addr,
            size: fx.size,
            kind: match fx.kind {
                MemEffectKind::Read => AccessKind::Read,
                MemEffectKind::Write | MemEffectKind::Modify => AccessKind::Write,
            },
        }),
        _ => None,
    }
}

/// The guest instruction whose statements are being copied.
struct CurrentInsn {
    ip: Addr,
    vector: StackVecRef,
    instrumented: bool,
    suppressed: bool,
}

pub fn instrument_with(
    checker: &mut Checker,
    sb: &SuperBlock,
    layout: &dyn GuestLayout,
    callees: HelperCallees,
) -> Result<SuperBlock, InstrumentError> {
    let arch = checker.triple().architecture;
    if layout.architecture() != arch {
        return Err(InstrumentError::ArchitectureMismatch(
            layout.architecture(),
            arch,
        ));
    }

    let mut b = SuperBlockBuilder::from_template(sb, layout);
    let mut current: Option<CurrentInsn> = None;

    for (index, stmt) in sb.stmts.iter().enumerate() {
        if let Stmt::IMark { addr, .. } = *stmt {
            if addr == 0 {
                return Err(InstrumentError::ZeroInstructionAddress(addr));
            }
            current = Some(CurrentInsn {
                ip: addr,
                vector: checker.stack_vector_at(addr),
                instrumented: false,
                suppressed: is_suppressed_epilogue(checker, layout, addr),
            });
        } else if let Some(mref) = memory_ref(sb, stmt) {
            let insn = current
                .as_mut()
                .ok_or(InstrumentError::MemoryAccessBeforeIMark { index })?;
            // Only the first memory reference of an instruction is checked.
            if !insn.instrumented {
                insn.instrumented = true;
                if !insn.suppressed {
                    let sp = b.load_sp();
                    let fp = b.load_fp();
                    b.dirty_call(
                        callees.memory_access,
                        &[
                            mref.addr,
                            sp.into(),
                            fp.into(),
                            Const::U64(mref.signed_size() as u64).into(),
                            Const::U64(insn.ip).into(),
                            vector_arg(insn.vector),
                        ],
                    )?;
                }
            }
        }
        b.push(stmt.clone());
    }

    if sb.ends_in_call() {
        let (ip, len, _) = sb.last_imark().ok_or(InstrumentError::CallWithoutIMark)?;
        let vector = checker.stack_vector_at(ip);
        let sp_adjust = if layout.call_pushes_return_address() {
            i64::from(arch.word_size())
        } else {
            0
        };
        let sp = b.load_sp();
        let fp = b.load_fp();
        b.dirty_call(
            callees.call,
            &[
                sp.into(),
                fp.into(),
                Const::U64(ip + u64::from(len)).into(),
                vector_arg(vector),
                Const::U64(sp_adjust as u64).into(),
            ],
        )?;
    }

    let out = b.finish_as_is();
    if tracing::enabled!(tracing::Level::TRACE) {
        trace!("instrumented block\n{}", SuperBlockWriter::new(&out).dump_string());
    }
    Ok(out)
}

fn vector_arg(vector: StackVecRef) -> Atom {
    Const::U64(vector.index() as u64).into()
}

fn is_suppressed_epilogue(checker: &Checker, layout: &dyn GuestLayout, ip: Addr) -> bool {
    let window = layout.epilogue_window().min(MAX_EPILOGUE_WINDOW);
    if !checker.config().suppress_frame_epilogue || window == 0 {
        return false;
    }
    let mut code = [0u8; MAX_EPILOGUE_WINDOW];
    let n = checker.env().read_code(ip, &mut code[..window]).min(window);
    layout.is_frame_epilogue(&code[..n])
}
