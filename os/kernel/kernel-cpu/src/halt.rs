//! Last-resort CPU stop.

/// Mask interrupts and halt this CPU forever.
///
/// Used when execution cannot safely continue: an unhandled trap, or a
/// must-not-return handler that returned anyway. NMIs still wake `hlt`,
/// hence the loop.
pub fn halt_forever() -> ! {
    loop {
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack, preserves_flags));
        }
    }
}

/// `extern "C"` wrapper so assembly tails can reach [`halt_forever`].
pub(crate) extern "C" fn halt_forever_c() -> ! {
    halt_forever()
}
