use sgcheck_triple::Architecture;

use super::GuestLayout;
use crate::Endian;

// X29 is the frame pointer; the return address goes to X30, not the stack.
const OFFSET_X29: u32 = 248;
const OFFSET_XSP: u32 = 264;
const OFFSET_PC: u32 = 272;

#[derive(Debug, Clone, Copy)]
pub struct Arm64Layout;

impl GuestLayout for Arm64Layout {
    fn architecture(&self) -> Architecture {
        Architecture::Arm64
    }

    fn offset_sp(&self) -> u32 {
        OFFSET_XSP
    }

    fn offset_fp(&self) -> u32 {
        OFFSET_X29
    }

    fn offset_ip(&self) -> u32 {
        OFFSET_PC
    }

    fn endian(&self) -> Endian {
        Endian::Le
    }

    fn call_pushes_return_address(&self) -> bool {
        false
    }
}
