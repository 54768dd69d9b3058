use crate::halt::halt_forever;
use crate::trap::{PageFaultError, TrapFrame, Vector};
use core::mem;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_qemu::qemu_trace;
use log::error;
use thiserror::Error;

/// A trap handler: exactly one per installed vector.
///
/// Runs on the interrupted thread's kernel stack with the frame the gate
/// prologue built; any mutation of the frame takes effect on return.
pub type Handler = extern "C" fn(&mut TrapFrame);

/// Registered handlers, indexed by vector. Zero means "not installed".
static HANDLERS: [AtomicUsize; 256] = [const { AtomicUsize::new(0) }; 256];

/// Errors from handler registration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrapError {
    /// The vector already has a handler; there is exactly one per gate.
    #[error("vector {0} already has a handler installed")]
    AlreadyInstalled(u8),
}

/// Register the handler for `vector`.
///
/// # Errors
/// Fails with [`TrapError::AlreadyInstalled`] if the vector is taken;
/// handlers are installed once and never swapped out under a live gate.
pub fn install_handler(vector: Vector, handler: Handler) -> Result<(), TrapError> {
    let slot = &HANDLERS[usize::from(vector.get())];
    slot.compare_exchange(0, handler as usize, Ordering::Release, Ordering::Relaxed)
        .map(|_| ())
        .map_err(|_| TrapError::AlreadyInstalled(vector.get()))
}

fn handler_for(vector: Vector) -> Option<Handler> {
    let bits = HANDLERS[usize::from(vector.get())].load(Ordering::Acquire);
    if bits == 0 {
        return None;
    }
    // SAFETY: non-zero slots only ever hold values stored from a `Handler`.
    Some(unsafe { mem::transmute::<usize, Handler>(bits) })
}

/// Called by every gate stub with the freshly built frame.
///
/// Not part of the public API; the gates reach it by symbol.
#[doc(hidden)]
pub extern "C" fn trap_dispatch(frame: *mut TrapFrame) {
    // SAFETY: the gate passes a frame it just built on the current stack.
    let frame = unsafe { &mut *frame };
    match handler_for(frame.vector()) {
        Some(handler) => handler(frame),
        None => unhandled_trap(frame),
    }
}

/// No handler installed: this is a kernel bug by definition. Report and stop.
fn unhandled_trap(frame: &TrapFrame) -> ! {
    error!("unhandled trap {}", frame.vector());
    qemu_trace!("{frame:?}\n");
    if frame.vector() == Vector::PAGE_FAULT {
        let err = PageFaultError::from_bits(frame.error);
        qemu_trace!("{}\n", err.explain());
    }
    halt_forever()
}
