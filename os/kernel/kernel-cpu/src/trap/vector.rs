use core::fmt;

/// An interrupt vector number.
///
/// Vectors 0–31 are the architectural exceptions; everything above is
/// available for external and software interrupts. The predicates here are
/// the single source of truth for which gate shape a vector gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Vector(u8);

impl Vector {
    pub const DIVIDE_ERROR: Self = Self(0); // #DE
    pub const DEBUG: Self = Self(1); // #DB
    pub const NMI: Self = Self(2);
    pub const BREAKPOINT: Self = Self(3); // #BP
    pub const OVERFLOW: Self = Self(4); // #OF
    pub const BOUND_RANGE: Self = Self(5); // #BR
    pub const INVALID_OPCODE: Self = Self(6); // #UD
    pub const DEVICE_NOT_AVAILABLE: Self = Self(7); // #NM
    pub const DOUBLE_FAULT: Self = Self(8); // #DF
    pub const INVALID_TSS: Self = Self(10); // #TS
    pub const SEGMENT_NOT_PRESENT: Self = Self(11); // #NP
    pub const STACK_FAULT: Self = Self(12); // #SS
    pub const GENERAL_PROTECTION: Self = Self(13); // #GP
    pub const PAGE_FAULT: Self = Self(14); // #PF
    pub const X87_FLOATING_POINT: Self = Self(16); // #MF
    pub const ALIGNMENT_CHECK: Self = Self(17); // #AC
    pub const MACHINE_CHECK: Self = Self(18); // #MC
    pub const SIMD_FLOATING_POINT: Self = Self(19); // #XM
    pub const VIRTUALIZATION: Self = Self(20); // #VE

    /// Number of architectural exception vectors.
    pub const EXCEPTION_COUNT: usize = 32;

    #[must_use]
    pub const fn new(vector: u8) -> Self {
        Self(vector)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether this vector lies in the architectural exception range.
    #[must_use]
    pub const fn is_exception(self) -> bool {
        (self.0 as usize) < Self::EXCEPTION_COUNT
    }

    /// Whether the CPU pushes a hardware error code for this vector.
    ///
    /// Decides the gate shape: these vectors get with-error stubs, all
    /// others get a zero dummy in the error slot.
    #[must_use]
    pub const fn has_error_code(self) -> bool {
        matches!(self.0, 8 | 10 | 11 | 12 | 13 | 14 | 17)
    }

    /// Whether returning from this vector is architecturally forbidden.
    ///
    /// Gates for these vectors halt the CPU if the handler comes back
    /// instead of re-executing a doomed instruction stream.
    #[must_use]
    pub const fn must_not_return(self) -> bool {
        matches!(self.0, 8 | 18)
    }

    /// Exception mnemonic (`#DE`, `#PF`, ...), if this is a named exception.
    #[must_use]
    pub const fn mnemonic(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "#DE",
            1 => "#DB",
            2 => "NMI",
            3 => "#BP",
            4 => "#OF",
            5 => "#BR",
            6 => "#UD",
            7 => "#NM",
            8 => "#DF",
            10 => "#TS",
            11 => "#NP",
            12 => "#SS",
            13 => "#GP",
            14 => "#PF",
            16 => "#MF",
            17 => "#AC",
            18 => "#MC",
            19 => "#XM",
            20 => "#VE",
            _ => return None,
        })
    }
}

impl From<u8> for Vector {
    fn from(vector: u8) -> Self {
        Self(vector)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(m) => write!(f, "{m} (vector {})", self.0),
            None => write!(f, "vector {}", self.0),
        }
    }
}
