use sgcheck_triple::Architecture;

use super::GuestLayout;
use crate::Endian;

// GPR1 is the stack pointer, GPR31 the conventional frame pointer.
const OFFSET_GPR1: u32 = 24;
const OFFSET_GPR31: u32 = 264;
const OFFSET_CIA: u32 = 1296;

#[derive(Debug, Clone, Copy)]
pub struct Ppc64Layout;

impl GuestLayout for Ppc64Layout {
    fn architecture(&self) -> Architecture {
        Architecture::Ppc64
    }

    fn offset_sp(&self) -> u32 {
        OFFSET_GPR1
    }

    fn offset_fp(&self) -> u32 {
        OFFSET_GPR31
    }

    fn offset_ip(&self) -> u32 {
        OFFSET_CIA
    }

    fn endian(&self) -> Endian {
        Endian::Be
    }

    fn call_pushes_return_address(&self) -> bool {
        false
    }
}
