//! Stack and global array overrun checker.
//!
//! Each guest instruction that touches memory learns, from its first access
//! in an activation, which block the access falls in: a block of its own
//! frame, a block a caller registered for the duration of a call, a global
//! block of a loaded object, or none of these. Later accesses that land
//! somewhere else are reported.
pub mod checker;
pub mod config;
pub mod descriptor;
pub mod diagnostic;
pub mod env;
pub mod error;
pub mod instance;
pub mod instrument;
pub mod interner;
pub mod interval;
pub mod invariant;
pub mod query_cache;
pub mod runtime;
pub mod sanity;
pub mod shadow_stack;
pub mod stats;
pub mod thread;

pub use checker::Checker;
pub use config::{CheckLevel, CheckerConfig};
pub use descriptor::{GlobalBlock, StackBlock};
pub use diagnostic::{AccessKind, Diagnostic, ErrorReport};
pub use env::{CallStack, GuestEnv, ObjectHandle};
pub use error::InstrumentError;
pub use instrument::{instrument, instrument_with, HelperCallees};
pub use interner::{DescriptorCache, GlobalBlockRef, StackBlockRef, StackVecRef};
pub use interval::{Interval, IntervalTree, NodeId};
pub use invariant::{Access, Invariant, InvariantKind};
pub use sanity::SanityViolation;
pub use stats::Stats;
pub use thread::{ThreadId, ThreadState};

pub use sgcheck_ir::Addr;
