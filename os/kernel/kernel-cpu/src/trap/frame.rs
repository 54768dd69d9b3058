use crate::trap::Vector;
use core::fmt;
use core::mem::{offset_of, size_of};
use kernel_registers::rflags::Rflags;

/// Size of a [`TrapFrame`] in bytes (22 qwords).
pub const TRAP_FRAME_SIZE: usize = 176;

/// Distance in bytes from a prologue-built frame to the hardware frame it
/// was built from: the 176-byte record plus the error-code slot (hardware's
/// own, or the zero dummy a no-error gate pushes).
///
/// The epilogue relies on this: given a hardware-frame base it recovers the
/// owning `TrapFrame` at `base - FRAME_TO_HW_GAP`, which is what makes a
/// redirected return restore the *target* thread's registers.
pub const FRAME_TO_HW_GAP: usize = TRAP_FRAME_SIZE + 8;

// The gate stubs address the frame by literal displacement; pin the layout.
const _: () = assert!(size_of::<TrapFrame>() == TRAP_FRAME_SIZE);
const _: () = assert!(offset_of!(TrapFrame, r15) == 0x00);
const _: () = assert!(offset_of!(TrapFrame, rax) == 0x70);
const _: () = assert!(offset_of!(TrapFrame, vector) == 0x78);
const _: () = assert!(offset_of!(TrapFrame, error) == 0x80);
const _: () = assert!(offset_of!(TrapFrame, rip) == 0x88);
const _: () = assert!(offset_of!(TrapFrame, cs) == 0x90);
const _: () = assert!(offset_of!(TrapFrame, rflags) == 0x98);
const _: () = assert!(offset_of!(TrapFrame, rsp) == 0xA0);
const _: () = assert!(offset_of!(TrapFrame, ss) == 0xA8);

/// Everything the CPU was doing when a vectored event fired.
///
/// Built on the interrupted thread's kernel stack by the gate prologue,
/// handed to the handler as `&mut`, consumed by the epilogue. On entry every
/// field reflects the interrupted state exactly; the handler may mutate any
/// field and the mutations take effect on `iretq`:
///
/// - `rip`/`cs`/`rflags` change where and under what flags execution
///   resumes.
/// - `rsp` holds the **hardware-frame base** (the address of the `rip` slot
///   the CPU pushed), *not* the interrupted stack pointer — that one lives
///   inside the hardware frame itself. Overwriting this field redirects the
///   epilogue to return through a different frame; use
///   [`redirect_return`](Self::redirect_return).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,

    /// Vector number of the gate that built this frame.
    pub vector: u64,

    /// Hardware error code for vectors that push one; zero otherwise.
    pub error: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: Rflags,

    /// Hardware-frame base on the owning thread's kernel stack.
    pub rsp: u64,

    /// Stack-segment selector at the time of entry.
    pub ss: u64,
}

impl TrapFrame {
    /// The vector this frame was built for.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn vector(&self) -> Vector {
        Vector::new(self.vector as u8)
    }

    /// Base address of the hardware frame this record returns through.
    #[must_use]
    pub const fn hw_frame_base(&self) -> u64 {
        self.rsp
    }

    /// Resume a different thread on return (preemptive switch).
    ///
    /// `target` must be a frame a gate prologue built on the target thread's
    /// kernel stack, kept alive for as long as that thread stays suspended.
    /// After this call the epilogue restores the target's registers and
    /// `iretq`s to its interrupted `rip`; the current thread stays suspended
    /// with this frame as its resume record.
    pub const fn redirect_return(&mut self, target: &Self) {
        self.rsp = target.rsp;
    }
}

impl fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} err={:#x} rip={:#018x} cs={:#x} ss={:#x}",
            self.vector(),
            self.error,
            self.rip,
            self.cs,
            self.ss
        )?;
        writeln!(f, "rflags={:#x}", self.rflags.into_bits())?;
        writeln!(
            f,
            "rax={:#018x} rbx={:#018x} rcx={:#018x} rdx={:#018x}",
            self.rax, self.rbx, self.rcx, self.rdx
        )?;
        writeln!(
            f,
            "rsi={:#018x} rdi={:#018x} rbp={:#018x} hwf={:#018x}",
            self.rsi, self.rdi, self.rbp, self.rsp
        )?;
        writeln!(
            f,
            "r8 ={:#018x} r9 ={:#018x} r10={:#018x} r11={:#018x}",
            self.r8, self.r9, self.r10, self.r11
        )?;
        write!(
            f,
            "r12={:#018x} r13={:#018x} r14={:#018x} r15={:#018x}",
            self.r12, self.r13, self.r14, self.r15
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> TrapFrame {
        // SAFETY: all-zero bytes are a valid TrapFrame image.
        unsafe { core::mem::zeroed() }
    }

    #[test]
    fn redirect_return_adopts_target_hw_frame() {
        let mut own = zeroed();
        own.rsp = 0xFFFF_8000_0001_0B90;

        let mut target = zeroed();
        target.rsp = 0xFFFF_8000_0002_0B90;
        target.r12 = 0xBBBB;

        own.redirect_return(&target);
        assert_eq!(own.hw_frame_base(), 0xFFFF_8000_0002_0B90);
        // The target frame itself is untouched.
        assert_eq!(target.r12, 0xBBBB);
    }

    #[test]
    fn gap_covers_frame_plus_error_slot() {
        assert_eq!(FRAME_TO_HW_GAP, 184);
        assert_eq!(TRAP_FRAME_SIZE % 16, 0);
    }
}
