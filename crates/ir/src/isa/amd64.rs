use sgcheck_triple::Architecture;

use super::{is_x86_family_epilogue, GuestLayout};
use crate::Endian;

const OFFSET_RSP: u32 = 48;
const OFFSET_RBP: u32 = 56;
const OFFSET_RIP: u32 = 184;

#[derive(Debug, Clone, Copy)]
pub struct Amd64Layout;

impl GuestLayout for Amd64Layout {
    fn architecture(&self) -> Architecture {
        Architecture::Amd64
    }

    fn offset_sp(&self) -> u32 {
        OFFSET_RSP
    }

    fn offset_fp(&self) -> u32 {
        OFFSET_RBP
    }

    fn offset_ip(&self) -> u32 {
        OFFSET_RIP
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
