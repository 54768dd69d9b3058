//! # Kernel-thread context switching
//!
//! A suspended kernel thread is nine qwords: the six callee-preserved
//! registers, its stack pointer, the instruction to resume at, and its
//! RFLAGS image. [`switch`] transfers the current CPU from one such record
//! to another; [`CpuContext::fresh`] synthesizes a record whose first resume
//! runs a thread trampoline that calls `entry(arg)` on the new stack.
//!
//! Two resume paths interoperate: a thread suspended by [`switch`] resumes
//! at the internal label and returns to its caller; a thread suspended by
//! preemption (its handler redirected the trap return, see
//! [`crate::trap::TrapFrame::redirect_return`]) resumes at its interrupted
//! instruction via `iretq`. Both restore exactly the callee-preserved set,
//! which is what makes them interchangeable from the scheduler's point of
//! view.

use core::mem::{offset_of, size_of};
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_registers::rflags::Rflags;

// The switch assembly addresses the record by literal displacement.
const _: () = assert!(size_of::<CpuContext>() == 72);
const _: () = assert!(offset_of!(CpuContext, r15) == 0x00);
const _: () = assert!(offset_of!(CpuContext, rbp) == 0x20);
const _: () = assert!(offset_of!(CpuContext, rbx) == 0x28);
const _: () = assert!(offset_of!(CpuContext, rsp) == 0x30);
const _: () = assert!(offset_of!(CpuContext, rip) == 0x38);
const _: () = assert!(offset_of!(CpuContext, rflags) == 0x40);

/// Saved state of a kernel thread that is not running on any CPU.
///
/// Only the callee-preserved register set is carried: a thread always
/// suspends at a procedure-call boundary ([`switch`] *is* a procedure call),
/// so the caller-saved registers are dead by the ABI's own rules. Threads
/// that need to carry more state do so on their stack.
///
/// A context is either *fresh* (built by [`CpuContext::fresh`], first resume
/// lands in the trampoline), *live* (owned by a running CPU, off-limits to
/// everyone else), or *suspended* (transferable by a future [`switch`]).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CpuContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbp: u64,
    pub rbx: u64,

    /// The thread's stack pointer. For a suspended thread this points at
    /// whatever the saved `rip` expects to find on the stack.
    pub rsp: u64,

    /// Where execution resumes.
    pub rip: u64,

    /// RFLAGS image restored *before* control transfers, so the incoming
    /// thread's interrupt-enable state is in force by the time it runs.
    pub rflags: Rflags,
}

impl CpuContext {
    /// An all-zero record, to be filled by a future [`switch`] out of the
    /// running thread.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbp: 0,
            rbx: 0,
            rsp: 0,
            rip: 0,
            rflags: Rflags::from_bits(0),
        }
    }

    /// Synthesize a never-run context.
    ///
    /// Places the first-run frame on the new thread's stack — the entry
    /// argument at `top - 16`, the entry function above it — and points the
    /// record at [`thread_trampoline`], which pops both, enables interrupts,
    /// aligns the stack and calls `entry(arg)`. If `entry` ever returns, the
    /// trampoline jumps to the routine registered with [`set_thread_exit`].
    ///
    /// # Safety
    /// `stack` must describe a writable region owned by the new thread and
    /// unused by anyone else; the thread owns it until the thread is gone.
    #[must_use]
    pub unsafe fn fresh(stack: StackRegion, entry: extern "C" fn(usize), arg: usize) -> Self {
        let top = stack.top();
        debug_assert!(stack.size >= 32, "no room for the first-run frame");

        let sp = top - 16;
        unsafe {
            (sp as usize as *mut u64).write(arg as u64);
            ((sp + 8) as usize as *mut u64).write(entry as usize as u64);
        }

        let mut ctx = Self::zeroed();
        ctx.rsp = sp;
        ctx.rip = thread_trampoline as usize as u64;
        ctx.rflags = Rflags::kernel_default();
        ctx
    }
}

/// A thread's stack: `size` bytes starting at `base`, growing downward from
/// the top.
#[derive(Debug, Clone, Copy)]
pub struct StackRegion {
    /// Lowest address of the region.
    pub base: u64,
    /// Length in bytes.
    pub size: u64,
}

impl StackRegion {
    #[must_use]
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// Highest usable stack address, aligned down to 16 bytes.
    #[must_use]
    pub const fn top(&self) -> u64 {
        (self.base + self.size) & !0xF
    }
}

/// Transfer this CPU from the thread owning `prev` to the one owning `next`.
///
/// Saves the callee-preserved set, the stack pointer, a resume label and the
/// current RFLAGS into `prev`, then restores `next` in the prescribed order:
/// stack pointer first, flags (so the incoming interrupt-enable state is
/// live before the transfer), callee-preserved registers, and finally an
/// indirect jump to the saved `rip` — addressed through the argument
/// register, which is the one register the restore never touches.
///
/// To the caller this is an ordinary function call that happens to return
/// only when some future `switch` (or a redirected trap return) targets
/// `prev`.
///
/// # Safety
/// - `prev` must identify the running thread, `next` a suspended or fresh
///   one whose stack is intact; neither may be touched by another CPU for
///   the duration.
/// - Interrupts must be disabled around the call (the save half must not be
///   torn); `kernel_sync::IrqGuard` is the usual way:
///
/// ```no_run
/// # use kernel_cpu::context::{CpuContext, switch};
/// # let mut prev = CpuContext::zeroed();
/// # let next = CpuContext::zeroed();
/// let _masked = kernel_sync::IrqGuard::new();
/// unsafe { switch(&raw mut prev, &raw const next) };
/// ```
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_prev: *mut CpuContext, _next: *const CpuContext) {
    core::arch::naked_asm!(
        // rdi = outgoing context, rsi = incoming context
        "mov [rdi + 0x00], r15",
        "mov [rdi + 0x08], r14",
        "mov [rdi + 0x10], r13",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], rbp",
        "mov [rdi + 0x28], rbx",
        // rsp still points at our return address; the resume label rides it
        "mov [rdi + 0x30], rsp",
        "lea rax, [rip + 2f]",
        "mov [rdi + 0x38], rax",
        "pushfq",
        "pop rax",
        "mov [rdi + 0x40], rax",
        // incoming side: stack, then flags, then registers, then control
        "mov rsp, [rsi + 0x30]",
        "push qword ptr [rsi + 0x40]",
        "popfq",
        "mov r15, [rsi + 0x00]",
        "mov r14, [rsi + 0x08]",
        "mov r13, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov rbp, [rsi + 0x20]",
        "mov rbx, [rsi + 0x28]",
        "jmp qword ptr [rsi + 0x38]",
        // a later switch lands here with the saved rsp, i.e. with our
        // caller's return address on top of the stack
        "2:",
        "ret",
    );
}

/// Exit routine used when the scheduler never registered one.
static THREAD_EXIT: AtomicUsize = AtomicUsize::new(0);

/// Register the routine a finished thread falls into.
///
/// Jumped to (not called) by [`thread_trampoline`] when a thread's entry
/// function returns; supplied by the external scheduler. Until one is
/// registered, a returning entry function halts its CPU.
pub fn set_thread_exit(exit: extern "C" fn() -> !) {
    THREAD_EXIT.store(exit as usize, Ordering::Release);
}

/// First-run prologue for fresh threads.
///
/// Expects the stack [`CpuContext::fresh`] built: the entry argument on top,
/// the entry function above it. Runs with whatever RFLAGS the switch
/// restored, enables interrupts explicitly, and gives the entry function a
/// 16-byte-aligned stack.
#[unsafe(naked)]
pub extern "C" fn thread_trampoline() {
    core::arch::naked_asm!(
        "pop rdi",
        "pop rax",
        "sti",
        "and rsp, -16",
        "call rax",
        // entry returned: hand the CPU to the scheduler's exit routine
        "mov r11, [rip + {exit}]",
        "test r11, r11",
        "jnz 2f",
        "lea r11, [rip + {fallback}]",
        "2:",
        "jmp r11",
        exit = sym THREAD_EXIT,
        fallback = sym crate::halt::halt_forever_c,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_top_aligns_down_to_16() {
        let region = StackRegion::new(0x1000, 0x1007);
        assert_eq!(region.top(), 0x2000);
        assert_eq!(region.top() % 16, 0);
    }

    #[test]
    fn fresh_context_places_the_first_run_frame() {
        let stack = vec![0u8; 4096];
        let base = stack.as_ptr() as u64;
        let region = StackRegion::new(base, 4096);

        extern "C" fn entry(_arg: usize) {}

        let ctx = unsafe { CpuContext::fresh(region, entry, 0x1234) };

        let top = region.top();
        assert_eq!(ctx.rsp, top - 16);
        assert_eq!(ctx.rip, thread_trampoline as usize as u64);
        assert_eq!(ctx.rflags, Rflags::kernel_default());

        let arg = unsafe { (ctx.rsp as usize as *const u64).read() };
        let entry_ptr = unsafe { ((ctx.rsp + 8) as usize as *const u64).read() };
        assert_eq!(arg, 0x1234);
        assert_eq!(entry_ptr, entry as usize as u64);

        // After the trampoline pops both values the stack is back at `top`,
        // which the `and rsp, -16` then leaves 16-byte aligned for the call.
        assert_eq!((ctx.rsp + 16) % 16, 0);

        drop(stack);
    }

    #[test]
    fn fresh_context_zeroes_the_callee_preserved_set() {
        let stack = vec![0u8; 4096];
        let region = StackRegion::new(stack.as_ptr() as u64, 4096);

        extern "C" fn entry(_arg: usize) {}

        let ctx = unsafe { CpuContext::fresh(region, entry, 0) };
        assert_eq!(
            (ctx.r15, ctx.r14, ctx.r13, ctx.r12, ctx.rbp, ctx.rbx),
            (0, 0, 0, 0, 0, 0)
        );
    }
}
