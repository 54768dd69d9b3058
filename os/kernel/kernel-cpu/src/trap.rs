//! # Trap entry and exit
//!
//! For every installed interrupt vector this module provides a naked entry
//! stub the IDT can point at. The stub turns the hardware-delivered frame
//! into a uniform [`TrapFrame`], calls the handler registered for the
//! vector, and returns through `iretq` — from the original frame, or from a
//! different thread's frame if the handler redirected the return
//! ([`TrapFrame::redirect_return`]).
//!
//! All transitions are same-privilege (CPL 0); there is no user-mode entry
//! or exit here, and no FPU/SIMD state is touched.
//!
//! ## IDT configuration preconditions
//!
//! The IDT loader is an external collaborator. It must install the gates as
//! interrupt gates (IF masked on entry), and it **must** give the
//! double-fault gate a dedicated IST stack: a #DF raised by a corrupt stack
//! pointer would otherwise escalate to a triple fault before the stub can
//! run.

mod dispatch;
mod frame;
mod gates;
mod page_fault;
mod vector;

pub use dispatch::{Handler, TrapError, install_handler};
pub use frame::{FRAME_TO_HW_GAP, TRAP_FRAME_SIZE, TrapFrame};
pub use gates::{Gate, GateShape, exception_gate, spurious_gate};
pub use page_fault::PageFaultError;
pub use vector::Vector;

#[doc(hidden)]
pub use dispatch::trap_dispatch;
