use sgcheck_ir::BuildError;
use sgcheck_triple::Architecture;

use crate::Addr;

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("memory access in statement {index} precedes the first IMark")]
    MemoryAccessBeforeIMark { index: usize },

    #[error("block ends in a call but has no IMark")]
    CallWithoutIMark,

    #[error("instruction address {0:#x} can't be instrumented")]
    ZeroInstructionAddress(Addr),

    #[error("guest architecture `{0}` doesn't match the checker's `{1}`")]
    ArchitectureMismatch(Architecture, Architecture),

    #[error("no checker installed")]
    NotInstalled,

    #[error(transparent)]
    Build(#[from] BuildError),
}
