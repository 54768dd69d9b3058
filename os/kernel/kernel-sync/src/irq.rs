//! Local interrupt masking.
//!
//! The trap prologue/epilogue and the register-transfer core of a context
//! switch must run with interrupts masked. Assembly paths mask themselves;
//! Rust code uses [`IrqGuard`] for the same discipline.

/// Disables maskable interrupts (`cli`).
///
/// Must only be called where `cli` is legal (CPL 0).
#[inline]
pub fn cli_stop_interrupts() {
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enables maskable interrupts (`sti`).
///
/// Must only be called where `sti` is legal (CPL 0).
#[inline]
pub fn sti_enable_interrupts() {
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Returns the current `RFLAGS` value (`pushfq`/`pop`).
///
/// Bit 9 (`IF`) tells whether interrupts are enabled.
#[inline]
#[must_use]
pub fn rflags() -> u64 {
    let r: u64;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nomem, preserves_flags)) }
    r
}

/// RAII guard that masks interrupts on creation and restores them on drop.
///
/// Snapshots the `IF` bit; if interrupts were enabled, executes `cli`, and
/// on drop executes `sti` only in that case, so nesting is harmless.
///
/// # Privilege
/// `cli`/`sti` require CPL 0; creating the guard elsewhere faults.
pub struct IrqGuard {
    /// Whether IF was set when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    /// Masks interrupts if they are currently enabled and remembers the state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = (rflags() & (1 << 9)) != 0;
        if enabled {
            cli_stop_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}
