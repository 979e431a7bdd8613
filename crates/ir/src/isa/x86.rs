use sgcheck_triple::Architecture;

use super::{is_x86_family_epilogue, GuestLayout};
use crate::Endian;

const OFFSET_ESP: u32 = 24;
const OFFSET_EBP: u32 = 28;
const OFFSET_EIP: u32 = 68;

#[derive(Debug, Clone, Copy)]
pub struct X86Layout;

impl GuestLayout for X86Layout {
    fn architecture(&self) -> Architecture {
        Architecture::X86
    }

    fn offset_sp(&self) -> u32 {
        OFFSET_ESP
    }

    fn offset_fp(&self) -> u32 {
        OFFSET_EBP
    }

    fn offset_ip(&self) -> u32 {
        OFFSET_EIP
    }

    fn endian(&self) -> Endian {
        Endian::Le
    }

    fn call_pushes_return_address(&self) -> bool {
        true
    }

    fn is_frame_epilogue(&self, code: &[u8]) -> bool {
        is_x86_family_epilogue(code)
    }

    fn epilogue_window(&self) -> usize {
        2
    }
}
