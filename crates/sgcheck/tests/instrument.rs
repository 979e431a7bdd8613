mod common;

use common::{amd64, checker, config, MockEnv};
use sgcheck::{instrument_with, Checker, HelperCallees, InstrumentError, StackBlock};
use sgcheck_ir::{
    ir_writer::SuperBlockWriter, layout_for, Atom, Callee, Const, DirtyCall, IrType, JumpKind,
    MemEffect, MemEffectKind, Stmt, SuperBlock, SuperBlockBuilder, UnOp,
};
use sgcheck_triple::{Architecture, TargetTriple};

fn callees() -> HelperCallees {
    HelperCallees {
        memory_access: Callee::new("mem", 0x100),
        call: Callee::new("call", 0x200),
    }
}

fn dirty_calls(sb: &SuperBlock) -> Vec<&DirtyCall> {
    sb.stmts
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Dirty(dirty) => Some(&**dirty),
            _ => None,
        })
        .collect()
}

fn const_arg(dirty: &DirtyCall, i: usize) -> u64 {
    dirty.args[i].as_const().unwrap().as_u64()
}

fn amd64_block() -> SuperBlock {
    let layout = layout_for(Architecture::Amd64);
    let mut b = SuperBlockBuilder::new(layout);
    b.imark(0x4000, 4);
    let sp = b.load_sp();
    let v = b.load(IrType::I32, sp);
    b.store(sp, v);
    b.imark(0x4004, 5);
    b.store(sp, Const::U64(0));
    b.finish(Const::U64(0x5000), JumpKind::Call)
}

#[test]
fn first_memory_reference_per_instruction() {
    let env = MockEnv::default().with_stack_blocks(0x4000, vec![StackBlock::sp_array(-16, 16, "A")]);
    let mut c = checker(&env);
    let layout = layout_for(Architecture::Amd64);

    let out = instrument_with(&mut c, &amd64_block(), layout, callees()).unwrap();
    insta::assert_snapshot!(SuperBlockWriter::new(&out).dump_string(), @r"
    IRSB {
       t0:I64   t1:I32   t2:I64   t3:I64   t4:I64   t5:I64   t6:I64   t7:I64

       ------ IMark(0x4000, 4, 0) ------
       t0 = GET:I64(48)
       t2 = GET:I64(48)
       t3 = GET:I64(56)
       DIRTY 1:I1 ::: mem{0x100}(t0,t2,t3,0x4:I64,0x4000:I64,0x0:I64)
       t1 = LDle:I32(t0)
       STle(t0) = t1
       ------ IMark(0x4004, 5, 0) ------
       t4 = GET:I64(48)
       t5 = GET:I64(56)
       DIRTY 1:I1 ::: mem{0x100}(t0,t4,t5,0xfffffffffffffff8:I64,0x4004:I64,0x1:I64)
       STle(t0) = 0x0:I64
       t6 = GET:I64(48)
       t7 = GET:I64(56)
       DIRTY 1:I1 ::: call{0x200}(t6,t7,0x4009:I64,0x1:I64,0x8:I64)
       PUT(184) = 0x5000:I64; exit-Call
    }
    ");

    let calls = dirty_calls(&out);
    let a = c.descriptors().stack_vector(sgcheck::StackVecRef::from_u32(const_arg(calls[0], 5) as u32));
    assert_eq!(a, &[StackBlock::sp_array(-16, 16, "A")]);
}

#[test]
fn debug_info_is_queried_once_per_address() {
    let env = MockEnv::default();
    let mut c = checker(&env);
    let layout = layout_for(Architecture::Amd64);
    let sb = amd64_block();

    instrument_with(&mut c, &sb, layout, callees()).unwrap();
    instrument_with(&mut c, &sb, layout, callees()).unwrap();
    assert_eq!(env.stack_block_queries(), 2);
}

#[test]
fn x86_arguments_are_widened() {
    let env = MockEnv::default();
    let x86 = TargetTriple::parse("x86-linux-gnu").unwrap();
    let mut c = Checker::new(config(), x86, Box::new(env.clone()));
    let layout = layout_for(Architecture::X86);

    let mut b = SuperBlockBuilder::new(layout);
    b.imark(0x8048000, 3);
    let sp = b.load_sp();
    b.load(IrType::I16, sp);
    let sb = b.finish(Const::U32(0x8048010), JumpKind::Call);

    let out = instrument_with(&mut c, &sb, layout, callees()).unwrap();
    let calls = dirty_calls(&out);
    assert_eq!(calls.len(), 2);
    for dirty in &calls {
        for arg in &dirty.args {
            assert_eq!(out.atom_ty(*arg), IrType::I64);
        }
    }
    assert!(out.stmts.iter().any(|stmt| matches!(
        stmt,
        Stmt::WrTmp {
            data: sgcheck_ir::Expr::Unop {
                op: UnOp::Widen32Uto64,
                ..
            },
            ..
        }
    )));
    assert_eq!(const_arg(calls[0], 3), 2);
    // Return address and SP adjustment of a 32-bit call.
    assert_eq!(const_arg(calls[1], 2), 0x8048003);
    assert_eq!(const_arg(calls[1], 4), 4);
}

#[test]
fn arm64_call_has_no_sp_adjustment() {
    let env = MockEnv::default();
    let arm64 = TargetTriple::parse("arm64-linux-gnu").unwrap();
    let mut c = Checker::new(config(), arm64, Box::new(env.clone()));
    let layout = layout_for(Architecture::Arm64);

    let mut b = SuperBlockBuilder::new(layout);
    b.imark(0x1000, 4);
    let sb = b.finish(Const::U64(0x2000), JumpKind::Call);

    let out = instrument_with(&mut c, &sb, layout, callees()).unwrap();
    let calls = dirty_calls(&out);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].callee.name, "call");
    assert_eq!(const_arg(calls[0], 2), 0x1004);
    assert_eq!(const_arg(calls[0], 4), 0);
}

#[test]
fn cas_and_helper_effects() {
    let env = MockEnv::default();
    let mut c = checker(&env);
    let layout = layout_for(Architecture::Amd64);

    let mut b = SuperBlockBuilder::new(layout);
    b.imark(0x4000, 5);
    let sp = b.load_sp();
    b.cas(sp, Const::U32(0), Const::U32(1));
    b.imark(0x4005, 2);
    b.dirty_call_with(
        Callee::new("guest_helper", 0x300),
        &[],
        Some(MemEffect {
            kind: MemEffectKind::Modify,
            addr: sp.into(),
            size: 16,
        }),
    )
    .unwrap();
    let sb = b.finish(Const::U64(0x4007), JumpKind::Boring);

    let out = instrument_with(&mut c, &sb, layout, callees()).unwrap();
    let calls: Vec<_> = dirty_calls(&out)
        .into_iter()
        .filter(|dirty| dirty.callee.name == "mem")
        .collect();
    assert_eq!(calls.len(), 2);
    assert_eq!(const_arg(calls[0], 3), 4);
    assert_eq!(const_arg(calls[1], 3) as i64, -16);
    assert_eq!(calls[1].args[0], Atom::from(sp));
}

#[test]
fn frame_epilogue_is_skipped() {
    let env = MockEnv::default().with_code(0x4010, &[0x5d, 0xc3]);
    let layout = layout_for(Architecture::Amd64);
    let mut b = SuperBlockBuilder::new(layout);
    b.imark(0x4010, 1);
    let sp = b.load_sp();
    b.load(IrType::I64, sp);
    let sb = b.finish(Const::U64(0), JumpKind::Ret);

    let mut c = checker(&env);
    let out = instrument_with(&mut c, &sb, layout, callees()).unwrap();
    assert!(dirty_calls(&out).is_empty());

    let mut keep = config();
    keep.suppress_frame_epilogue = false;
    let mut c = Checker::new(keep, amd64(), Box::new(env.clone()));
    let out = instrument_with(&mut c, &sb, layout, callees()).unwrap();
    assert_eq!(dirty_calls(&out).len(), 1);
}

#[test]
fn malformed_blocks() {
    let env = MockEnv::default();
    let mut c = checker(&env);
    let layout = layout_for(Architecture::Amd64);

    let mut b = SuperBlockBuilder::new(layout);
    let sp = b.load_sp();
    b.load(IrType::I64, sp);
    let sb = b.finish(Const::U64(0), JumpKind::Boring);
    assert!(matches!(
        instrument_with(&mut c, &sb, layout, callees()),
        Err(InstrumentError::MemoryAccessBeforeIMark { index: 1 })
    ));

    let sb = SuperBlockBuilder::new(layout).finish(Const::U64(0), JumpKind::Call);
    assert!(matches!(
        instrument_with(&mut c, &sb, layout, callees()),
        Err(InstrumentError::CallWithoutIMark)
    ));

    let err = instrument_with(&mut c, &sb, layout_for(Architecture::Ppc64), callees()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "guest architecture `ppc64` doesn't match the checker's `amd64`"
    );
}
