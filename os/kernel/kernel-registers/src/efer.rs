use crate::msr::Msr;
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// `IA32_EFER` (MSR `0xC000_0080`).
///
/// The long-mode switch lives here: setting `LME` with paging enabled
/// activates IA-32e mode, which the CPU confirms by setting the read-only
/// `LMA` bit. Vendor-specific bits are folded into reserved ranges.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// Bit 0 — SCE: SYSCALL/SYSRET enable.
    pub sce: bool,

    /// Bits 1–7 — legacy/AMD-only bits, treated as reserved.
    #[bits(7, default = 0)]
    _reserved0: u8,

    /// Bit 8 — LME: Long Mode Enable.
    pub lme: bool,

    /// Bit 9 — Reserved.
    #[bits(default = false)]
    _reserved1: bool,

    /// Bit 10 — LMA: Long Mode Active (read-only, set by hardware).
    #[bits(access = RO)]
    pub lma: bool,

    /// Bit 11 — NXE: No-Execute page-table bit enable.
    pub nxe: bool,

    /// Bits 12–63 — vendor extensions and reserved, preserved verbatim.
    #[bits(52, default = 0)]
    _reserved2: u64,
}

impl Efer {
    /// MSR index of `IA32_EFER`.
    pub const MSR_EFER: Msr = Msr(0xC000_0080);
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        Self::from_bits(unsafe { Self::MSR_EFER.load_raw() })
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Efer {
    unsafe fn store_unsafe(self) {
        unsafe { Self::MSR_EFER.store_raw(self.into_bits()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lme_is_bit_8() {
        assert_eq!(Efer::new().with_lme(true).into_bits(), 1 << 8);
    }
}
