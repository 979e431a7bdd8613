//! Per-target guest state layout.
//!
//! The checker only needs to know where the stack and frame pointers live in
//! the guest state, how wide a guest word is, and how to address a
//! sub-register inside a slot.
use sgcheck_triple::Architecture;

use crate::{Endian, IrType};

pub mod amd64;
pub mod arm64;
pub mod ppc64;
pub mod x86;

pub trait GuestLayout: Sync {
    fn architecture(&self) -> Architecture;

    fn offset_sp(&self) -> u32;
    fn offset_fp(&self) -> u32;
    fn offset_ip(&self) -> u32;

    fn endian(&self) -> Endian;

    /// Returns `true` if a call instruction pushes the return address onto
    /// the stack, so the stack pointer after the call is one word below the
    /// stack pointer at the call.
    fn call_pushes_return_address(&self) -> bool;

    fn word_ty(&self) -> IrType {
        match self.architecture().word_size() {
            4 => IrType::I32,
            _ => IrType::I64,
        }
    }

    /// Offset of the low `sub_size` bytes of the `reg_size`-byte slot at
    /// `reg_offset`.
    fn sub_slot_offset(&self, reg_offset: u32, reg_size: u32, sub_size: u32) -> u32 {
        debug_assert!(sub_size <= reg_size);
        match self.endian() {
            Endian::Le => reg_offset,
            Endian::Be => reg_offset + reg_size - sub_size,
        }
    }

    /// Returns `true` if `code` starts with an epilogue sequence whose stack
    /// read would look like an access outside any frame block.
    fn is_frame_epilogue(&self, _code: &[u8]) -> bool {
        false
    }

    /// Number of code bytes [`GuestLayout::is_frame_epilogue`] inspects.
    fn epilogue_window(&self) -> usize {
        0
    }
}

pub fn layout_for(arch: Architecture) -> &'static dyn GuestLayout {
    match arch {
        Architecture::X86 => &x86::X86Layout,
        Architecture::Amd64 => &amd64::Amd64Layout,
        Architecture::Arm64 => &arm64::Arm64Layout,
        Architecture::Ppc64 => &ppc64::Ppc64Layout,
    }
}

/// `pop %bp; ret` and `leave; ret`, shared by x86 and amd64.
pub(crate) fn is_x86_family_epilogue(code: &[u8]) -> bool {
    matches!(code, [0x5d, 0xc3, ..] | [0xc9, 0xc3, ..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_types() {
        assert_eq!(layout_for(Architecture::X86).word_ty(), IrType::I32);
        assert_eq!(layout_for(Architecture::Amd64).word_ty(), IrType::I64);
        assert_eq!(layout_for(Architecture::Arm64).word_ty(), IrType::I64);
    }

    #[test]
    fn epilogue_quirk_is_x86_only() {
        let pop_ret = [0x5d, 0xc3, 0x90];
        let leave_ret = [0xc9, 0xc3];
        assert!(layout_for(Architecture::Amd64).is_frame_epilogue(&pop_ret));
        assert!(layout_for(Architecture::X86).is_frame_epilogue(&leave_ret));
        assert!(!layout_for(Architecture::Amd64).is_frame_epilogue(&[0x5d]));
        assert!(!layout_for(Architecture::Arm64).is_frame_epilogue(&pop_ret));
    }

    #[test]
    fn sub_slot_little_endian() {
        let layout = layout_for(Architecture::Amd64);
        assert_eq!(layout.sub_slot_offset(48, 8, 4), 48);
    }
}
