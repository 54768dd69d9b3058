//! Host-side exercise of the context-switch primitive.
//!
//! The switch assembly is plain user-mode-legal code (moves, `pushfq`,
//! `popfq`, an indirect jump), so a round trip between the test "thread" and
//! a hand-built guest context runs fine in an ordinary process. The
//! first-run trampoline is *not* driven here — it executes `sti`, which
//! only an emulator or real ring 0 can run.

use kernel_cpu::context::{CpuContext, StackRegion, switch, thread_trampoline};
use kernel_registers::LoadRegister;
use kernel_registers::rflags::Rflags;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

static MAIN_CTX: AtomicPtr<CpuContext> = AtomicPtr::new(std::ptr::null_mut());
static GUEST_CTX: AtomicPtr<CpuContext> = AtomicPtr::new(std::ptr::null_mut());
static ENTERED: AtomicBool = AtomicBool::new(false);
static GUEST_STACK_MARK: AtomicUsize = AtomicUsize::new(0);

extern "C" fn guest() {
    ENTERED.store(true, Ordering::SeqCst);

    // record roughly where we are executing: must be inside the guest stack
    let marker = 0u8;
    GUEST_STACK_MARK.store(std::ptr::from_ref(&marker) as usize, Ordering::SeqCst);

    let prev = GUEST_CTX.load(Ordering::SeqCst);
    let next = MAIN_CTX.load(Ordering::SeqCst);
    // SAFETY: prev is this thread's own record, next is the suspended test
    // context filled by the first switch.
    unsafe { switch(prev, next) };
    unreachable!("the guest context is never resumed");
}

#[test]
fn switch_round_trip_returns_to_the_caller() {
    let stack = vec![0u8; 64 * 1024];
    let stack_lo = stack.as_ptr() as usize;
    let stack_hi = stack_lo + stack.len();

    // Enter `guest` the way a call would have: 16-aligned minus the return
    // address slot, with a dummy return address the guest never pops.
    let top16 = stack_hi & !15;
    let sp = top16 - 8;
    unsafe { (sp as *mut u64).write(0) };

    let main_ctx = Box::into_raw(Box::new(CpuContext::zeroed()));
    let mut guest_start = CpuContext::zeroed();
    guest_start.rsp = sp as u64;
    guest_start.rip = guest as usize as u64;
    guest_start.rflags = Rflags::load();
    let guest_ctx = Box::into_raw(Box::new(guest_start));

    MAIN_CTX.store(main_ctx, Ordering::SeqCst);
    GUEST_CTX.store(guest_ctx, Ordering::SeqCst);
    ENTERED.store(false, Ordering::SeqCst);

    // SAFETY: main_ctx is this thread's record to fill; guest_ctx points at
    // a prepared stack and entry.
    unsafe { switch(main_ctx, guest_ctx) };

    // We are back: the guest ran and switched to the record the first
    // switch filled for us.
    assert!(ENTERED.load(Ordering::SeqCst));

    let mark = GUEST_STACK_MARK.load(Ordering::SeqCst);
    assert!(
        (stack_lo..stack_hi).contains(&mark),
        "guest ran on its own stack"
    );

    // The guest's suspension record is fully populated and points back into
    // its stack, ready for a (never-issued) future resume.
    let guest_saved = unsafe { Box::from_raw(guest_ctx) };
    assert!((stack_lo as u64..stack_hi as u64).contains(&guest_saved.rsp));
    assert_ne!(guest_saved.rip, 0);

    drop(unsafe { Box::from_raw(main_ctx) });
    drop(stack);
}

#[test]
fn fresh_context_matches_the_trampoline_convention() {
    let stack = vec![0u8; 8 * 1024];
    let region = StackRegion::new(stack.as_ptr() as u64, stack.len() as u64);

    extern "C" fn entry(_arg: usize) {}

    // SAFETY: the region is backed by the Vec above.
    let ctx = unsafe { CpuContext::fresh(region, entry, 0xCAFE) };

    assert_eq!(ctx.rip, thread_trampoline as usize as u64);
    assert_eq!(ctx.rsp, region.top() - 16);

    // The trampoline pops the argument first, the entry pointer second.
    let arg = unsafe { (ctx.rsp as usize as *const u64).read() };
    let fun = unsafe { ((ctx.rsp as usize + 8) as *const u64).read() };
    assert_eq!(arg, 0xCAFE);
    assert_eq!(fun, entry as usize as u64);

    // Pre-call alignment: after both pops rsp is back at the 16-aligned
    // top, so `and rsp, -16` is a no-op and the `call` sees rsp % 16 == 0.
    assert_eq!((ctx.rsp + 16) % 16, 0);

    drop(stack);
}
