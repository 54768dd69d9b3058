//! # CPU-bound kernel core for `x86_64`
//!
//! The three subsystems that sit directly on the architectural contract:
//!
//! - [`trap`] — interrupt/exception entry and exit: per-vector gate stubs
//!   that materialize a [`trap::TrapFrame`], dispatch to a registered
//!   handler, and return through `iretq` — including the switch-on-return
//!   path where the handler resumes a *different* thread.
//! - [`context`] — kernel-thread context switching: the
//!   [`context::CpuContext`] record, the [`context::switch`] primitive and
//!   the trampoline that first-runs a fresh thread.
//! - [`smp`] — the real-mode → long-mode trampoline that brings a secondary
//!   CPU up to the kernel entry point, plus the [`smp::ApBoot`] handoff
//!   block shared with the bootstrap processor.
//!
//! Everything above this layer — scheduler policy, page-fault resolution,
//! IDT/GDT loading, LAPIC programming, memory allocation — is a collaborator
//! that either registers callbacks here or consumes the raw artifacts (gate
//! symbols, the trampoline image) this crate exposes.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod context;
pub mod halt;
pub mod smp;
pub mod trap;
