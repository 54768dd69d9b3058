//! The real-mode → long-mode trampoline image.
//!
//! Assembled into the kernel's text section but never executed in place:
//! the BSP copies the bytes to a page below 1 MiB, patches the two handoff
//! slots, and points a SIPI at the page. The image is position-independent
//! in its 16- and 32-bit stages — every intra-image address is derived at
//! run time from `CS << 4` plus the `call`/`pop` idiom, because the load
//! page is the firmware's choice and unknown at build time.
//!
//! Register discipline across the stages: `%ebx` carries the physical load
//! address from the 16-bit stage into the 32-bit stage, `%esi`/`%rsi` the
//! handoff pointer; neither is clobbered by the control-register and MSR
//! writes in between.

use core::slice;
use thiserror::Error;

// Stage layout, AT&T syntax throughout (16-bit and mixed-width code reads
// much better this way, and the mode-switch idioms are documented in this
// dialect everywhere from the SDM onward).
//
// Entry state after SIPI: CS = vector << 8, IP = 0, interrupts and paging
// off, nothing else defined.
core::arch::global_asm!(
    r#"
.section .text.ap_trampoline, "ax"
.balign 16
.global ap_tramp_start
.code16
ap_tramp_start:
    cli
    cld

    // flat-ish data access within the image: all data segments = CS
    movw %cs, %ax
    movw %ax, %ds
    movw %ax, %es
    movw %ax, %ss

    // SP is undefined after SIPI; borrow the scratch area embedded in the
    // image before the first push (SIPI entry is always at segment offset 0)
    movw $(ap_tramp_stack_top - ap_tramp_start), %sp

    // locate ourselves: %bp = image offset inside the segment,
    // %ebx = physical load address
    call 1f
1:  popw %bp
    subw $(1b - ap_tramp_start), %bp
    movzwl %bp, %ebx
    movw %cs, %ax
    movzwl %ax, %eax
    shll $4, %eax
    addl %eax, %ebx

    // the GDT descriptor needs a linear base; fill it in place
    leal (ap_tramp_gdt - ap_tramp_start)(%ebx), %eax
    movl %eax, (ap_tramp_gdtdesc - ap_tramp_start + 2)(%bp)
    lgdtl (ap_tramp_gdtdesc - ap_tramp_start)(%bp)

    // protected mode on
    movl %cr0, %eax
    orl $1, %eax
    movl %eax, %cr0

    // far pointer to the 32-bit stage, built in the image, selector 0x08
    leal (ap_tramp_pm32 - ap_tramp_start)(%ebx), %eax
    movl %eax, (ap_tramp_farptr - ap_tramp_start)(%bp)
    movw $0x08, (ap_tramp_farptr - ap_tramp_start + 4)(%bp)
    ljmpl *(ap_tramp_farptr - ap_tramp_start)(%bp)

.code32
ap_tramp_pm32:
    movw $0x10, %ax
    movw %ax, %ds
    movw %ax, %es
    movw %ax, %ss

    // rebase the in-image scratch stack now that addressing is linear
    leal (ap_tramp_stack_top - ap_tramp_start)(%ebx), %esp

    // PAE, then the kernel's page tables from the patched handoff block
    movl %cr4, %eax
    orl $0x20, %eax
    movl %eax, %cr4

    movl (ap_tramp_handoff32 - ap_tramp_start)(%ebx), %esi
    movl 0x08(%esi), %eax
    movl %eax, %cr3

    // EFER.LME, then paging: this is the long-mode switch
    movl $0xC0000080, %ecx
    rdmsr
    orl $0x100, %eax
    wrmsr

    movl %cr0, %eax
    orl $0x80000001, %eax
    movl %eax, %cr0

    // far-return into the 64-bit code segment
    pushl $0x18
    leal (ap_tramp_lm64 - ap_tramp_start)(%ebx), %eax
    pushl %eax
    lretl

.code64
ap_tramp_lm64:
    // reload the handoff pointer through the 64-bit slot; RIP-relative, so
    // the copied image finds its own copy
    movq ap_tramp_handoff64(%rip), %rsi

    movq 0x20(%rsi), %rsp           // per-CPU stack top
    movq 0x28(%rsi), %rax           // kernel entry
    movl $1, 0x00(%rsi)             // ready_flag: long mode reached
    movq %rsi, %rdi                 // entry gets the handoff block
    jmp *%rax

// --- data, kept in text so the image is a single copyable blob ---

.balign 8
.global ap_tramp_handoff32
ap_tramp_handoff32:
    .long 0x0badc0de                // patched: ApBoot physical address
.global ap_tramp_handoff64
ap_tramp_handoff64:
    .quad 0x0badc0de0badc0de        // patched: ApBoot physical address

// tiny scratch stack: the 16-bit stage pushes one return address, the
// 32-bit stage one far-return frame
.balign 16
ap_tramp_stack:
    .space 16
ap_tramp_stack_top:

.balign 4
ap_tramp_farptr:
    .long 0                         // offset, filled at run time
    .word 0                         // selector, filled at run time

ap_tramp_gdtdesc:
    .word ap_tramp_gdt_end - ap_tramp_gdt - 1
    .long 0                         // base, filled at run time

.balign 8
ap_tramp_gdt:
    .quad 0                         // null
    .quad 0x00CF9A000000FFFF        // 0x08: 32-bit code, flat
    .quad 0x00CF92000000FFFF        // 0x10: data, flat
    .quad 0x00209A0000000000        // 0x18: 64-bit code
ap_tramp_gdt_end:

.global ap_tramp_end
ap_tramp_end:

.text
"#,
    options(att_syntax)
);

#[allow(non_upper_case_globals)]
unsafe extern "C" {
    static ap_tramp_start: u8;
    static ap_tramp_end: u8;
    static ap_tramp_handoff32: u8;
    static ap_tramp_handoff64: u8;
}

/// Placeholder the BSP must find in the 32-bit patch slot of a fresh copy.
pub const HANDOFF32_PLACEHOLDER: u32 = 0x0BAD_C0DE;

/// Placeholder the BSP must find in the 64-bit patch slot of a fresh copy.
pub const HANDOFF64_PLACEHOLDER: u64 = 0x0BAD_C0DE_0BAD_C0DE;

/// Errors from [`patch_handoff`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SmpError {
    /// The buffer is not an exact copy of the trampoline image.
    #[error("trampoline copy is {got} bytes, expected {expected}")]
    ImageSize { expected: usize, got: usize },

    /// A patch slot does not hold its placeholder — the buffer is not a
    /// fresh copy of the image (or was copied from the wrong place).
    #[error("patch slot at offset {offset:#x} does not hold the placeholder")]
    PlaceholderMismatch { offset: usize },

    /// The handoff block must be reachable from 32-bit code.
    #[error("handoff block at {0:#x} is not addressable from 32-bit code")]
    HandoffNotAddressable(u64),
}

/// The raw trampoline bytes, ready to copy below 1 MiB.
#[must_use]
pub fn trampoline_image() -> &'static [u8] {
    // SAFETY: the symbols bracket the assembled image in the text section;
    // only their addresses are taken.
    unsafe {
        let start = &raw const ap_tramp_start;
        let end = &raw const ap_tramp_end;
        let len = end as usize - start as usize;
        slice::from_raw_parts(start, len)
    }
}

/// Byte offset of the 32-bit handoff-pointer slot within the image.
#[must_use]
pub fn handoff32_offset() -> usize {
    // SAFETY: address-of only; both symbols live in the image.
    unsafe { (&raw const ap_tramp_handoff32) as usize - (&raw const ap_tramp_start) as usize }
}

/// Byte offset of the 64-bit handoff-pointer slot within the image.
#[must_use]
pub fn handoff64_offset() -> usize {
    // SAFETY: address-of only; both symbols live in the image.
    unsafe { (&raw const ap_tramp_handoff64) as usize - (&raw const ap_tramp_start) as usize }
}

/// Write the handoff block's physical address into both patch slots of a
/// copied image.
///
/// Verifies the placeholders first: overwriting the wrong bytes here is the
/// kind of bug that only manifests as an AP wandering off into nowhere, so
/// a mis-copied buffer is rejected instead of patched.
///
/// # Errors
/// See [`SmpError`]. `handoff_phys` must fit in 32 bits because the 32-bit
/// stage dereferences it before long mode is available.
pub fn patch_handoff(image: &mut [u8], handoff_phys: u64) -> Result<(), SmpError> {
    let expected = trampoline_image().len();
    if image.len() != expected {
        return Err(SmpError::ImageSize {
            expected,
            got: image.len(),
        });
    }

    let handoff32 =
        u32::try_from(handoff_phys).map_err(|_| SmpError::HandoffNotAddressable(handoff_phys))?;

    let off32 = handoff32_offset();
    let off64 = handoff64_offset();

    if image[off32..off32 + 4] != HANDOFF32_PLACEHOLDER.to_le_bytes() {
        return Err(SmpError::PlaceholderMismatch { offset: off32 });
    }
    if image[off64..off64 + 8] != HANDOFF64_PLACEHOLDER.to_le_bytes() {
        return Err(SmpError::PlaceholderMismatch { offset: off64 });
    }

    image[off32..off32 + 4].copy_from_slice(&handoff32.to_le_bytes());
    image[off64..off64 + 8].copy_from_slice(&handoff_phys.to_le_bytes());

    Ok(())
}
