use bitfield_struct::bitfield;

/// Architectural RFLAGS model for `x86_64`.
///
/// The value type is what the CPU core stores in trap frames and suspended
/// thread contexts; bit 1 is architecturally fixed to 1 and modeled as a
/// read-only default so a [`Rflags::new()`] value is already a legal image
/// to `popfq`.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Rflags {
    /// Carry Flag
    pub carry: bool, // 0

    /// Always 1 in 64-bit mode.
    #[bits(default = true)]
    _always1: bool, // 1

    /// Parity Flag
    pub parity: bool, // 2

    #[bits(default = false)]
    _rsvd3: bool, // 3

    /// Adjust Flag
    pub adjust: bool, // 4

    #[bits(default = false)]
    _rsvd5: bool, // 5

    /// Zero Flag
    pub zero: bool, // 6

    /// Sign Flag
    pub sign: bool, // 7

    /// Trap Flag (single-step)
    pub trap: bool, // 8

    /// Interrupt Enable Flag.
    ///
    /// The one bit this crate's consumers actually branch on: it decides
    /// whether an interrupt may preempt at the next instruction boundary.
    pub interrupt_enable: bool, // 9

    /// Direction Flag
    pub direction: bool, // 10

    /// Overflow Flag
    pub overflow: bool, // 11

    /// I/O Privilege Level
    #[bits(2)]
    pub iopl: u8, // 12–13

    /// Nested Task
    pub nested_task: bool, // 14

    #[bits(default = false)]
    _rsvd15: bool, // 15

    /// Resume Flag
    pub resume: bool, // 16

    /// Virtual-8086 mode; must stay 0 in 64-bit mode.
    #[bits(default = false)]
    _vm: bool, // 17

    /// Alignment Check
    pub alignment_check: bool, // 18

    /// Virtual Interrupt Flag
    pub virtual_interrupt: bool, // 19

    /// Virtual Interrupt Pending
    pub virtual_interrupt_pending: bool, // 20

    /// ID Flag (CPUID toggleable)
    pub id_cpuid: bool, // 21

    /// Reserved 22–63
    #[bits(42, default = false)]
    _reserved_rest: u64,
}

impl Rflags {
    /// The flags image a fresh kernel thread starts with: reserved bit 1 set,
    /// interrupts enabled, everything else clear (`0x202`).
    #[must_use]
    pub const fn kernel_default() -> Self {
        Self::new().with_interrupt_enable(true)
    }
}

#[cfg(feature = "asm")]
impl crate::LoadRegister for Rflags {
    /// Read the current RFLAGS via `pushfq`/`pop` (legal at any CPL).
    fn load() -> Self {
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "pushfq",
                "pop {}",
                out(reg) rflags,
                options(nomem, preserves_flags)
            );
        }
        Self::from_bits(rflags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_image_is_0x202() {
        assert_eq!(Rflags::kernel_default().into_bits(), 0x202);
    }

    #[test]
    fn interrupt_enable_is_bit_9() {
        let flags = Rflags::new().with_interrupt_enable(true);
        assert_eq!(flags.into_bits() & (1 << 9), 1 << 9);
    }
}
