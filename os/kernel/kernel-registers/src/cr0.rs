use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR0 — primary control register.
///
/// The CPU core cares about two transitions encoded here: real → protected
/// mode (`PE`) and the final paging enable (`PG`) that, together with
/// `EFER.LME`, activates long mode. The remaining architecturally defined
/// bits are modeled so a read-modify-write never clobbers them.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Cr0 {
    /// Bit 0 — PE: Protection Enable (protected mode when set).
    pub protection: bool,

    /// Bit 1 — MP: Monitor Coprocessor.
    pub monitor_coprocessor: bool,

    /// Bit 2 — EM: x87 Emulation.
    pub emulation: bool,

    /// Bit 3 — TS: Task Switched.
    pub task_switched: bool,

    /// Bit 4 — ET: Extension Type (reads as 1 on modern CPUs).
    pub extension_type: bool,

    /// Bit 5 — NE: Numeric Error reporting via #MF.
    pub numeric_error: bool,

    /// Bits 6–15 — Reserved.
    #[bits(10, default = 0)]
    _reserved_6_15: u16,

    /// Bit 16 — WP: Write Protect in supervisor mode.
    pub write_protect: bool,

    /// Bit 17 — Reserved.
    #[bits(default = false)]
    _reserved_17: bool,

    /// Bit 18 — AM: Alignment Mask.
    pub alignment_mask: bool,

    /// Bits 19–28 — Reserved.
    #[bits(10, default = 0)]
    _reserved_19_28: u16,

    /// Bit 29 — NW: Not-Write-Through.
    pub not_write_through: bool,

    /// Bit 30 — CD: Cache Disable.
    pub cache_disable: bool,

    /// Bit 31 — PG: Paging enable (requires PE=1).
    pub paging: bool,

    /// Bits 32–63 — Reserved.
    #[bits(32, default = 0)]
    _reserved_32_63: u32,
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let cr0: u64;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_switch_bits() {
        // The trampoline's hand-encoded constants must match the model.
        assert_eq!(Cr0::new().with_protection(true).into_bits(), 1);
        assert_eq!(
            Cr0::new().with_paging(true).with_protection(true).into_bits(),
            (1 << 31) | 1
        );
    }
}
