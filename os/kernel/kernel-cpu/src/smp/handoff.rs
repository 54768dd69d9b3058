use core::mem::{offset_of, size_of};
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_registers::cr3::Cr3;

// The trampoline reads these fields by literal displacement from its patched
// pointer; the layout is part of the BSP↔AP contract and must never drift.
const _: () = assert!(offset_of!(ApBoot, ready_flag) == 0x00);
const _: () = assert!(offset_of!(ApBoot, cr3) == 0x08);
const _: () = assert!(offset_of!(ApBoot, stack_top) == 0x20);
const _: () = assert!(offset_of!(ApBoot, entry64) == 0x28);
const _: () = assert!(offset_of!(ApBoot, hhdm) == 0x30);
const _: () = assert!(size_of::<ApBoot>() == 0x38);

/// Handoff block shared between the BSP and one waking AP.
///
/// Allocated and filled by the BSP, observed by the AP from inside the
/// trampoline, abandoned once [`ready`](Self::ready) reports true. The AP
/// dereferences the block by *physical* address both before and after
/// paging is on, so the BSP's page tables must identity-map it (and the
/// trampoline page itself).
#[repr(C)]
pub struct ApBoot {
    /// Set to 1 by the AP the moment it reaches 64-bit mode.
    ready_flag: AtomicU32,
    _pad: u32,

    /// Physical page-table root the AP loads into CR3.
    cr3: u64,

    _reserved: [u64; 2],

    /// Top of the AP's own kernel stack; the AP arrives at the entry point
    /// with `rsp` equal to this.
    stack_top: u64,

    /// Virtual address of the AP's kernel entry function. Receives the
    /// block's address as its first argument and must not return.
    entry64: u64,

    /// Higher-half direct-map base, for the entry function's convenience.
    hhdm: u64,
}

impl ApBoot {
    #[must_use]
    pub const fn new(cr3: Cr3, stack_top: u64, entry64: u64, hhdm: u64) -> Self {
        Self {
            ready_flag: AtomicU32::new(0),
            _pad: 0,
            cr3: cr3.into_bits(),
            _reserved: [0; 2],
            stack_top,
            entry64,
            hhdm,
        }
    }

    /// Whether the AP has reached 64-bit mode.
    ///
    /// The BSP polls this after the SIPIs; the timeout is the BSP's call.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready_flag.load(Ordering::Acquire) == 1
    }

    #[must_use]
    pub const fn stack_top(&self) -> u64 {
        self.stack_top
    }

    #[must_use]
    pub const fn entry64(&self) -> u64 {
        self.entry64
    }

    #[must_use]
    pub const fn hhdm(&self) -> u64 {
        self.hhdm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let boot = ApBoot::new(Cr3::from_table_phys(0x10_0000), 0xFFFF_8000_0010_0000, 0xFFFF_8000_0020_0000, 0xFFFF_8000_0000_0000);
        assert!(!boot.ready());
    }

    #[test]
    fn field_bytes_sit_at_the_contract_offsets() {
        let boot = ApBoot::new(
            Cr3::from_table_phys(0x0023_4000),
            0x1111_2222_3333_4440,
            0x5555_6666_7777_8880,
            0x9999_0000_AAAA_0000,
        );

        let base = core::ptr::from_ref(&boot).cast::<u8>();
        let qword_at = |off: usize| {
            let mut bytes = [0u8; 8];
            // SAFETY: reads stay inside the struct.
            unsafe { core::ptr::copy_nonoverlapping(base.add(off), bytes.as_mut_ptr(), 8) };
            u64::from_le_bytes(bytes)
        };

        assert_eq!(qword_at(0x08), 0x0023_4000);
        assert_eq!(qword_at(0x20), 0x1111_2222_3333_4440);
        assert_eq!(qword_at(0x28), 0x5555_6666_7777_8880);
        assert_eq!(qword_at(0x30), 0x9999_0000_AAAA_0000);
    }
}
