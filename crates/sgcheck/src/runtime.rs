//! Process-wide checker driven by instrumented guest code.
//!
//! The framework serialises hook invocations under its scheduler lock, so the
//! mutex here is never contended; it only gives the `extern "C"` entry points
//! a safe place to reach the [`Checker`]. A panic inside a hook aborts the
//! process instead of unwinding into generated code.
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    sync::{Mutex, MutexGuard, PoisonError},
};

use cranelift_entity::EntityRef;
use sgcheck_ir::{Callee, GuestLayout, SuperBlock};
use tracing::{error, warn};

use crate::{
    checker::Checker,
    env::ObjectHandle,
    error::InstrumentError,
    instrument::{self, HelperCallees},
    interner::StackVecRef,
};

static RUNTIME: Mutex<Option<Checker>> = Mutex::new(None);

fn lock() -> MutexGuard<'static, Option<Checker>> {
    RUNTIME.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Makes `checker` the target of the hooks, returning the previous one.
pub fn install(checker: Checker) -> Option<Checker> {
    lock().replace(checker)
}

pub fn uninstall() -> Option<Checker> {
    lock().take()
}

pub fn is_installed() -> bool {
    lock().is_some()
}

/// Runs `f` on the installed checker.
pub fn with_checker<R>(f: impl FnOnce(&mut Checker) -> R) -> Option<R> {
    lock().as_mut().map(f)
}

/// Instrumentation entry point for the framework.
pub fn instrument(sb: &SuperBlock, layout: &dyn GuestLayout) -> Result<SuperBlock, InstrumentError> {
    let mut guard = lock();
    let checker = guard.as_mut().ok_or(InstrumentError::NotInstalled)?;
    instrument::instrument(checker, sb, layout)
}

fn run_hook(name: &'static str, f: impl FnOnce(&mut Checker)) {
    let result = catch_unwind(AssertUnwindSafe(|| match lock().as_mut() {
        Some(checker) => f(checker),
        None => warn!(hook = name, "hook called with no checker installed"),
    }));
    if result.is_err() {
        error!(hook = name, "fatal error in hook, aborting");
        process::abort();
    }
}

pub extern "C" fn sg_on_memory_access(ea: u64, sp: u64, fp: u64, signed_size: i64, ip: u64, vector: u64) {
    run_hook("sg_on_memory_access", |checker| {
        let tid = checker.env().current_thread();
        let vector = StackVecRef::new(vector as usize);
        checker.on_memory_access(tid, ea, sp, fp, signed_size, ip, vector);
    });
}

/// `sp_adjust` is added to the post-call SP to recover the SP at the call.
pub extern "C" fn sg_on_call(sp_after_call: u64, fp: u64, ret_addr: u64, vector: u64, sp_adjust: i64) {
    run_hook("sg_on_call", |checker| {
        let tid = checker.env().current_thread();
        let sp_at_call = sp_after_call.wrapping_add_signed(sp_adjust);
        let vector = StackVecRef::new(vector as usize);
        checker.on_call(tid, sp_at_call, sp_after_call, fp, ret_addr, vector);
    });
}

pub extern "C" fn sg_on_stack_unwind(sp_new: u64) {
    run_hook("sg_on_stack_unwind", |checker| {
        let tid = checker.env().current_thread();
        checker.on_stack_unwind(tid, sp_new);
    });
}

pub extern "C" fn sg_on_globals_loaded(handle: u64) {
    run_hook("sg_on_globals_loaded", |checker| {
        checker.on_globals_loaded(ObjectHandle(handle));
    });
}

pub extern "C" fn sg_on_region_unmapped(addr: u64, size: u64) {
    run_hook("sg_on_region_unmapped", |checker| {
        checker.on_region_unmapped(addr, size);
    });
}

/// The hook entry points registered with the framework.
#[derive(Debug, Clone, Copy)]
pub struct Hooks {
    pub on_memory_access: extern "C" fn(u64, u64, u64, i64, u64, u64),
    pub on_call: extern "C" fn(u64, u64, u64, u64, i64),
    pub on_stack_unwind: extern "C" fn(u64),
    pub on_globals_loaded: extern "C" fn(u64),
    pub on_region_unmapped: extern "C" fn(u64, u64),
}

pub fn hooks() -> Hooks {
    Hooks {
        on_memory_access: sg_on_memory_access,
        on_call: sg_on_call,
        on_stack_unwind: sg_on_stack_unwind,
        on_globals_loaded: sg_on_globals_loaded,
        on_region_unmapped: sg_on_region_unmapped,
    }
}

pub fn helper_callees() -> HelperCallees {
    let hooks = hooks();
    HelperCallees {
        memory_access: Callee::new(
            "sg_on_memory_access",
            hooks.on_memory_access as usize as u64,
        ),
        call: Callee::new("sg_on_call", hooks.on_call as usize as u64),
    }
}
