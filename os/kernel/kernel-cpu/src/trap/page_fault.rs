use bitfield_struct::bitfield;

/// Page-fault error code layout (`x86_64`).
///
/// Decoding only — resolving the fault (paging something in, killing the
/// offender) is the installed handler's business, not this crate's.
/// Reference: Intel SDM Vol. 3A, "Page-Fault Exception (#PF)".
#[bitfield(u64)]
pub struct PageFaultError {
    /// 0 = non-present page, 1 = protection violation.
    pub present: bool, // bit 0

    /// 0 = read or execute, 1 = write.
    pub write: bool, // bit 1

    /// 0 = supervisor access, 1 = user-mode access.
    pub user: bool, // bit 2

    /// Reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// Instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    /// Protection-key violation (CR4.PKE).
    pub protection_key: bool, // bit 5

    /// Shadow-stack access (CET-SS).
    pub shadow_stack: bool, // bit 6

    #[bits(57)]
    __: u64,
}

impl PageFaultError {
    #[must_use]
    pub fn explain(&self) -> &'static str {
        if !self.present() {
            "non-present page (not mapped or swapped out)"
        } else if self.instruction_fetch() {
            "instruction fetch from protected page (NX or SMEP)"
        } else if self.write() {
            "write to protected page"
        } else {
            "read from protected page"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_write_protection_violation() {
        // present | write | supervisor
        let err = PageFaultError::from_bits(0x3);
        assert!(err.present());
        assert!(err.write());
        assert!(!err.user());
        assert_eq!(err.explain(), "write to protected page");
    }

    #[test]
    fn decodes_not_present_read() {
        let err = PageFaultError::from_bits(0x0);
        assert_eq!(err.explain(), "non-present page (not mapped or swapped out)");
    }
}
