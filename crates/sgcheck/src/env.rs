//! Services the checker consumes from the surrounding framework.
use std::fmt;

use smallvec::SmallVec;

use crate::{
    descriptor::{GlobalBlock, StackBlock},
    thread::ThreadId,
    Addr,
};

/// Loader handle identifying a batch of newly mapped debug info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Guest code addresses of a captured call stack, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    pub ips: SmallVec<[Addr; 8]>,
}

impl CallStack {
    pub fn new(ips: impl IntoIterator<Item = Addr>) -> Self {
        Self {
            ips: ips.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ip) in self.ips.iter().enumerate() {
            let word = if i == 0 { "at" } else { "by" };
            writeln!(f, "   {word} {ip:#x}")?;
        }
        Ok(())
    }
}

pub trait GuestEnv: Send {
    /// The guest thread currently holding the scheduler lock.
    fn current_thread(&self) -> ThreadId;

    /// Stack blocks in scope at `ip`.
    fn stack_blocks_at(&self, ip: Addr, arrays_only: bool) -> Vec<StackBlock>;

    /// Global blocks of the objects newly tagged with `handle`.
    fn global_blocks_for(&self, handle: ObjectHandle, arrays_only: bool) -> Vec<GlobalBlock>;

    fn record_call_stack(&self, _tid: ThreadId, _first_ip_delta: u64) -> CallStack {
        CallStack::default()
    }

    /// Copies guest code at `ip` into `buf`, returning the number of bytes
    /// available.
    fn read_code(&self, _ip: Addr, _buf: &mut [u8]) -> usize {
        0
    }
}
