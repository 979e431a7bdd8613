#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use cranelift_entity::EntityRef;
use rustc_hash::FxHashMap;
use sgcheck::{
    Addr, CallStack, CheckLevel, Checker, CheckerConfig, GlobalBlock, GuestEnv, ObjectHandle,
    StackBlock, ThreadId,
};
use sgcheck_triple::TargetTriple;

#[derive(Debug, Default)]
pub struct MockState {
    pub stack_blocks: FxHashMap<Addr, Vec<StackBlock>>,
    pub globals: FxHashMap<u64, Vec<GlobalBlock>>,
    pub code: FxHashMap<Addr, Vec<u8>>,
    pub current: usize,
    pub stack_block_queries: usize,
}

/// Debug info and scheduler stand-in. Clones share state, so a test can keep
/// a handle after moving one into the checker.
#[derive(Debug, Clone, Default)]
pub struct MockEnv(Arc<Mutex<MockState>>);

impl MockEnv {
    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }

    pub fn with_stack_blocks(self, ip: Addr, blocks: Vec<StackBlock>) -> Self {
        self.state().stack_blocks.insert(ip, blocks);
        self
    }

    pub fn with_globals(self, handle: u64, blocks: Vec<GlobalBlock>) -> Self {
        self.state().globals.insert(handle, blocks);
        self
    }

    pub fn with_code(self, ip: Addr, code: &[u8]) -> Self {
        self.state().code.insert(ip, code.to_vec());
        self
    }

    pub fn set_current(&self, tid: ThreadId) {
        self.state().current = tid.index();
    }

    pub fn stack_block_queries(&self) -> usize {
        self.state().stack_block_queries
    }
}

impl GuestEnv for MockEnv {
    fn current_thread(&self) -> ThreadId {
        ThreadId::new(self.state().current)
    }

    fn stack_blocks_at(&self, ip: Addr, arrays_only: bool) -> Vec<StackBlock> {
        let mut state = self.state();
        state.stack_block_queries += 1;
        state
            .stack_blocks
            .get(&ip)
            .into_iter()
            .flatten()
            .filter(|b| b.is_vec || !arrays_only)
            .cloned()
            .collect()
    }

    fn global_blocks_for(&self, handle: ObjectHandle, arrays_only: bool) -> Vec<GlobalBlock> {
        self.state()
            .globals
            .get(&handle.0)
            .into_iter()
            .flatten()
            .filter(|b| b.is_vec || !arrays_only)
            .cloned()
            .collect()
    }

    fn record_call_stack(&self, tid: ThreadId, _first_ip_delta: u64) -> CallStack {
        CallStack::new([0xdead_0000 + tid.index() as u64])
    }

    fn read_code(&self, ip: Addr, buf: &mut [u8]) -> usize {
        let state = self.state();
        let Some(code) = state.code.get(&ip) else {
            return 0;
        };
        let n = code.len().min(buf.len());
        buf[..n].copy_from_slice(&code[..n]);
        n
    }
}

pub fn amd64() -> TargetTriple {
    TargetTriple::parse("amd64-linux-gnu").unwrap()
}

pub fn config() -> CheckerConfig {
    CheckerConfig::for_level(CheckLevel::Paranoid).with_max_threads(8)
}

pub fn checker(env: &MockEnv) -> Checker {
    Checker::new(config(), amd64(), Box::new(env.clone()))
}

/// Creates thread `n` and pushes its bootstrap activation at `sp`.
pub fn start_thread(checker: &mut Checker, n: usize, sp: Addr) -> ThreadId {
    let tid = ThreadId::new(n);
    checker.on_thread_created(None, tid);
    checker.on_thread_first_insn(tid, sp);
    tid
}
