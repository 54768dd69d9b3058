//! # Secondary-CPU bring-up
//!
//! After a startup IPI an application processor wakes in 16-bit real mode at
//! the page the SIPI vector names. The [`trampoline`] image walks it up to
//! long mode and hands it to the kernel; the [`ApBoot`] block carries
//! everything the walk needs (page tables, a per-CPU stack, the entry
//! point).
//!
//! Division of labor with the bootstrap processor:
//!
//! 1. BSP allocates an [`ApBoot`] block and fills it.
//! 2. BSP copies [`trampoline_image`] to a free, page-aligned page below
//!    1 MiB and writes the block's physical address into the two patch slots
//!    via [`patch_handoff`].
//! 3. BSP sends INIT, waits, then sends SIPI (twice, per the MP spec) with
//!    the page number as vector — LAPIC programming happens outside this
//!    crate.
//! 4. BSP polls [`ApBoot::ready`] with a timeout of its choosing; a trapped
//!    AP simply never flips the flag, and deciding to abandon it is BSP
//!    policy.
//!
//! The AP runs the image once and never returns to it.

mod handoff;
mod trampoline;

pub use handoff::ApBoot;
pub use trampoline::{
    HANDOFF32_PLACEHOLDER, HANDOFF64_PLACEHOLDER, SmpError, handoff32_offset, handoff64_offset,
    patch_handoff, trampoline_image,
};
