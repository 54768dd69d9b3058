//! Naked entry stubs, one per vector.
//!
//! Every gate is self-contained: it normalizes the error-code slot, reserves
//! the 176-byte [`TrapFrame`](crate::trap::TrapFrame), stores the fifteen
//! general registers *before* touching any of them, copies the hardware
//! return state, dispatches, and returns through `iretq` from whichever
//! hardware frame the handler left in the frame's `rsp` slot.
//!
//! Stack discipline: interrupt delivery in 64-bit mode aligns RSP to 16
//! before pushing the 5-qword hardware frame, so the error-code slot
//! (hardware's or our dummy) lands the stack back on a 16-byte boundary.
//! The 176-byte reserve keeps it there, and the `call` below leaves the
//! dispatcher with standard SysV entry alignment.

use crate::trap::vector::Vector;

/// Stamp a trap gate entry stub.
///
/// Four shapes:
///
/// - `no_error` — the CPU pushes no error code for this vector; the stub
///   pushes a zero dummy so both shapes share one frame layout.
/// - `with_error` — the CPU pushed an error code at the entry RSP.
/// - `... diverging` — same prologues, but the gate halts the CPU if the
///   handler returns (for vectors whose semantics forbid resumption).
///
/// The surrounding kernel can use this to stamp gates for device vectors:
///
/// ```ignore
/// kernel_cpu::trap_gate!(no_error, lapic_timer_gate, 0xE0);
/// idt[0xE0].set_handler(lapic_timer_gate); // external IDT loader
/// ```
#[macro_export]
macro_rules! trap_gate {
    (no_error, $name:ident, $vector:expr) => {
        #[doc = concat!("Entry stub for vector ", stringify!($vector), " (no hardware error code).")]
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            ::core::arch::naked_asm!(
                // keep the frame-to-hardware-frame gap uniform
                "push 0",
                // prologue: reserve the frame, spill the register file
                "sub rsp, 176",
                "mov [rsp + 0x00], r15",
                "mov [rsp + 0x08], r14",
                "mov [rsp + 0x10], r13",
                "mov [rsp + 0x18], r12",
                "mov [rsp + 0x20], r11",
                "mov [rsp + 0x28], r10",
                "mov [rsp + 0x30], r9",
                "mov [rsp + 0x38], r8",
                "mov [rsp + 0x40], rsi",
                "mov [rsp + 0x48], rdi",
                "mov [rsp + 0x50], rbp",
                "mov [rsp + 0x58], rdx",
                "mov [rsp + 0x60], rcx",
                "mov [rsp + 0x68], rbx",
                "mov [rsp + 0x70], rax",
                "mov qword ptr [rsp + 0x78], {vector}",
                "mov rax, [rsp + 176]",
                "mov [rsp + 0x80], rax",
                // capture the hardware return state
                "lea rax, [rsp + 184]",
                "mov rdx, [rax + 0x00]",
                "mov [rsp + 0x88], rdx",
                "mov rdx, [rax + 0x08]",
                "mov [rsp + 0x90], rdx",
                "mov rdx, [rax + 0x10]",
                "mov [rsp + 0x98], rdx",
                "mov [rsp + 0xA0], rax",
                "mov rdx, ss",
                "mov [rsp + 0xA8], rdx",
                "cld",
                "mov rdi, rsp",
                "call {dispatch}",
                // epilogue: return through the (possibly redirected) frame
                "cli",
                "mov rax, [rsp + 0xA0]",
                "lea rsp, [rax - 184]",
                "mov rdx, [rsp + 0x88]",
                "mov [rax + 0x00], rdx",
                "mov rdx, [rsp + 0x90]",
                "mov [rax + 0x08], rdx",
                "mov rdx, [rsp + 0x98]",
                "mov [rax + 0x10], rdx",
                "mov r15, [rsp + 0x00]",
                "mov r14, [rsp + 0x08]",
                "mov r13, [rsp + 0x10]",
                "mov r12, [rsp + 0x18]",
                "mov r11, [rsp + 0x20]",
                "mov r10, [rsp + 0x28]",
                "mov r9,  [rsp + 0x30]",
                "mov r8,  [rsp + 0x38]",
                "mov rsi, [rsp + 0x40]",
                "mov rdi, [rsp + 0x48]",
                "mov rbp, [rsp + 0x50]",
                "mov rdx, [rsp + 0x58]",
                "mov rcx, [rsp + 0x60]",
                "mov rbx, [rsp + 0x68]",
                "mov rax, [rsp + 0x70]",
                "mov rsp, [rsp + 0xA0]",
                "iretq",
                vector = const $vector,
                dispatch = sym $crate::trap::trap_dispatch,
            );
        }
    };
    (with_error, $name:ident, $vector:expr) => {
        #[doc = concat!("Entry stub for vector ", stringify!($vector), " (hardware error code).")]
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            ::core::arch::naked_asm!(
                // the CPU already pushed the error code at [rsp]
                "sub rsp, 176",
                "mov [rsp + 0x00], r15",
                "mov [rsp + 0x08], r14",
                "mov [rsp + 0x10], r13",
                "mov [rsp + 0x18], r12",
                "mov [rsp + 0x20], r11",
                "mov [rsp + 0x28], r10",
                "mov [rsp + 0x30], r9",
                "mov [rsp + 0x38], r8",
                "mov [rsp + 0x40], rsi",
                "mov [rsp + 0x48], rdi",
                "mov [rsp + 0x50], rbp",
                "mov [rsp + 0x58], rdx",
                "mov [rsp + 0x60], rcx",
                "mov [rsp + 0x68], rbx",
                "mov [rsp + 0x70], rax",
                "mov qword ptr [rsp + 0x78], {vector}",
                "mov rax, [rsp + 176]",
                "mov [rsp + 0x80], rax",
                "lea rax, [rsp + 184]",
                "mov rdx, [rax + 0x00]",
                "mov [rsp + 0x88], rdx",
                "mov rdx, [rax + 0x08]",
                "mov [rsp + 0x90], rdx",
                "mov rdx, [rax + 0x10]",
                "mov [rsp + 0x98], rdx",
                "mov [rsp + 0xA0], rax",
                "mov rdx, ss",
                "mov [rsp + 0xA8], rdx",
                "cld",
                "mov rdi, rsp",
                "call {dispatch}",
                "cli",
                "mov rax, [rsp + 0xA0]",
                "lea rsp, [rax - 184]",
                "mov rdx, [rsp + 0x88]",
                "mov [rax + 0x00], rdx",
                "mov rdx, [rsp + 0x90]",
                "mov [rax + 0x08], rdx",
                "mov rdx, [rsp + 0x98]",
                "mov [rax + 0x10], rdx",
                "mov r15, [rsp + 0x00]",
                "mov r14, [rsp + 0x08]",
                "mov r13, [rsp + 0x10]",
                "mov r12, [rsp + 0x18]",
                "mov r11, [rsp + 0x20]",
                "mov r10, [rsp + 0x28]",
                "mov r9,  [rsp + 0x30]",
                "mov r8,  [rsp + 0x38]",
                "mov rsi, [rsp + 0x40]",
                "mov rdi, [rsp + 0x48]",
                "mov rbp, [rsp + 0x50]",
                "mov rdx, [rsp + 0x58]",
                "mov rcx, [rsp + 0x60]",
                "mov rbx, [rsp + 0x68]",
                "mov rax, [rsp + 0x70]",
                "mov rsp, [rsp + 0xA0]",
                "iretq",
                vector = const $vector,
                dispatch = sym $crate::trap::trap_dispatch,
            );
        }
    };
    (no_error diverging, $name:ident, $vector:expr) => {
        #[doc = concat!("Entry stub for vector ", stringify!($vector), " (must not return).")]
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            ::core::arch::naked_asm!(
                "push 0",
                "sub rsp, 176",
                "mov [rsp + 0x00], r15",
                "mov [rsp + 0x08], r14",
                "mov [rsp + 0x10], r13",
                "mov [rsp + 0x18], r12",
                "mov [rsp + 0x20], r11",
                "mov [rsp + 0x28], r10",
                "mov [rsp + 0x30], r9",
                "mov [rsp + 0x38], r8",
                "mov [rsp + 0x40], rsi",
                "mov [rsp + 0x48], rdi",
                "mov [rsp + 0x50], rbp",
                "mov [rsp + 0x58], rdx",
                "mov [rsp + 0x60], rcx",
                "mov [rsp + 0x68], rbx",
                "mov [rsp + 0x70], rax",
                "mov qword ptr [rsp + 0x78], {vector}",
                "mov rax, [rsp + 176]",
                "mov [rsp + 0x80], rax",
                "lea rax, [rsp + 184]",
                "mov rdx, [rax + 0x00]",
                "mov [rsp + 0x88], rdx",
                "mov rdx, [rax + 0x08]",
                "mov [rsp + 0x90], rdx",
                "mov rdx, [rax + 0x10]",
                "mov [rsp + 0x98], rdx",
                "mov [rsp + 0xA0], rax",
                "mov rdx, ss",
                "mov [rsp + 0xA8], rdx",
                "cld",
                "mov rdi, rsp",
                "call {dispatch}",
                // resumption is architecturally forbidden here; a returning
                // handler parks the CPU instead of re-executing doomed code
                "cli",
                "2:",
                "hlt",
                "jmp 2b",
                vector = const $vector,
                dispatch = sym $crate::trap::trap_dispatch,
            );
        }
    };
    (with_error diverging, $name:ident, $vector:expr) => {
        #[doc = concat!("Entry stub for vector ", stringify!($vector), " (error code, must not return).")]
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            ::core::arch::naked_asm!(
                "sub rsp, 176",
                "mov [rsp + 0x00], r15",
                "mov [rsp + 0x08], r14",
                "mov [rsp + 0x10], r13",
                "mov [rsp + 0x18], r12",
                "mov [rsp + 0x20], r11",
                "mov [rsp + 0x28], r10",
                "mov [rsp + 0x30], r9",
                "mov [rsp + 0x38], r8",
                "mov [rsp + 0x40], rsi",
                "mov [rsp + 0x48], rdi",
                "mov [rsp + 0x50], rbp",
                "mov [rsp + 0x58], rdx",
                "mov [rsp + 0x60], rcx",
                "mov [rsp + 0x68], rbx",
                "mov [rsp + 0x70], rax",
                "mov qword ptr [rsp + 0x78], {vector}",
                "mov rax, [rsp + 176]",
                "mov [rsp + 0x80], rax",
                "lea rax, [rsp + 184]",
                "mov rdx, [rax + 0x00]",
                "mov [rsp + 0x88], rdx",
                "mov rdx, [rax + 0x08]",
                "mov [rsp + 0x90], rdx",
                "mov rdx, [rax + 0x10]",
                "mov [rsp + 0x98], rdx",
                "mov [rsp + 0xA0], rax",
                "mov rdx, ss",
                "mov [rsp + 0xA8], rdx",
                "cld",
                "mov rdi, rsp",
                "call {dispatch}",
                "cli",
                "2:",
                "hlt",
                "jmp 2b",
                vector = const $vector,
                dispatch = sym $crate::trap::trap_dispatch,
            );
        }
    };
}

crate::trap_gate!(no_error, divide_error_gate, 0);
crate::trap_gate!(no_error, debug_gate, 1);
crate::trap_gate!(no_error, nmi_gate, 2);
crate::trap_gate!(no_error, breakpoint_gate, 3);
crate::trap_gate!(no_error, overflow_gate, 4);
crate::trap_gate!(no_error, bound_range_gate, 5);
crate::trap_gate!(no_error, invalid_opcode_gate, 6);
crate::trap_gate!(no_error, device_not_available_gate, 7);
crate::trap_gate!(with_error diverging, double_fault_gate, 8);
crate::trap_gate!(no_error, coprocessor_overrun_gate, 9);
crate::trap_gate!(with_error, invalid_tss_gate, 10);
crate::trap_gate!(with_error, segment_not_present_gate, 11);
crate::trap_gate!(with_error, stack_fault_gate, 12);
crate::trap_gate!(with_error, general_protection_gate, 13);
crate::trap_gate!(with_error, page_fault_gate, 14);
crate::trap_gate!(no_error, reserved_15_gate, 15);
crate::trap_gate!(no_error, x87_floating_point_gate, 16);
crate::trap_gate!(with_error, alignment_check_gate, 17);
crate::trap_gate!(no_error diverging, machine_check_gate, 18);
crate::trap_gate!(no_error, simd_floating_point_gate, 19);
crate::trap_gate!(no_error, virtualization_gate, 20);
crate::trap_gate!(no_error, control_protection_gate, 21);
crate::trap_gate!(no_error, reserved_22_gate, 22);
crate::trap_gate!(no_error, reserved_23_gate, 23);
crate::trap_gate!(no_error, reserved_24_gate, 24);
crate::trap_gate!(no_error, reserved_25_gate, 25);
crate::trap_gate!(no_error, reserved_26_gate, 26);
crate::trap_gate!(no_error, reserved_27_gate, 27);
crate::trap_gate!(no_error, hypervisor_injection_gate, 28);
crate::trap_gate!(no_error, vmm_communication_gate, 29);
crate::trap_gate!(no_error, security_exception_gate, 30);
crate::trap_gate!(no_error, reserved_31_gate, 31);

/// Minimal gate for spurious APIC interrupts: no frame, no dispatch, no EOI.
///
/// Touches nothing and leaves the hardware frame alone.
#[unsafe(naked)]
pub extern "C" fn spurious_gate() {
    ::core::arch::naked_asm!("iretq");
}

/// Which frame shape a gate's prologue expects from the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateShape {
    /// The CPU pushes no error code; the stub supplies a zero dummy.
    NoError,
    /// The CPU pushes an error code below the return frame.
    WithError,
}

/// One installable gate: the entry symbol plus its shape.
///
/// This is the unit the external IDT loader consumes. Remember the #DF
/// precondition from the module docs: its gate needs an IST stack.
#[derive(Clone, Copy)]
pub struct Gate {
    entry: extern "C" fn(),
    shape: GateShape,
}

impl Gate {
    const fn new(entry: extern "C" fn(), shape: GateShape) -> Self {
        Self { entry, shape }
    }

    /// The entry symbol to put into the IDT descriptor.
    #[must_use]
    pub fn entry(self) -> extern "C" fn() {
        self.entry
    }

    /// Address of the entry symbol.
    #[must_use]
    pub fn entry_addr(self) -> u64 {
        self.entry as usize as u64
    }

    #[must_use]
    pub const fn shape(self) -> GateShape {
        self.shape
    }
}

/// Vector → gate mapping for the 32 architectural exception vectors.
static EXCEPTION_GATES: [Gate; Vector::EXCEPTION_COUNT] = [
    Gate::new(divide_error_gate, GateShape::NoError),
    Gate::new(debug_gate, GateShape::NoError),
    Gate::new(nmi_gate, GateShape::NoError),
    Gate::new(breakpoint_gate, GateShape::NoError),
    Gate::new(overflow_gate, GateShape::NoError),
    Gate::new(bound_range_gate, GateShape::NoError),
    Gate::new(invalid_opcode_gate, GateShape::NoError),
    Gate::new(device_not_available_gate, GateShape::NoError),
    Gate::new(double_fault_gate, GateShape::WithError),
    Gate::new(coprocessor_overrun_gate, GateShape::NoError),
    Gate::new(invalid_tss_gate, GateShape::WithError),
    Gate::new(segment_not_present_gate, GateShape::WithError),
    Gate::new(stack_fault_gate, GateShape::WithError),
    Gate::new(general_protection_gate, GateShape::WithError),
    Gate::new(page_fault_gate, GateShape::WithError),
    Gate::new(reserved_15_gate, GateShape::NoError),
    Gate::new(x87_floating_point_gate, GateShape::NoError),
    Gate::new(alignment_check_gate, GateShape::WithError),
    Gate::new(machine_check_gate, GateShape::NoError),
    Gate::new(simd_floating_point_gate, GateShape::NoError),
    Gate::new(virtualization_gate, GateShape::NoError),
    Gate::new(control_protection_gate, GateShape::NoError),
    Gate::new(reserved_22_gate, GateShape::NoError),
    Gate::new(reserved_23_gate, GateShape::NoError),
    Gate::new(reserved_24_gate, GateShape::NoError),
    Gate::new(reserved_25_gate, GateShape::NoError),
    Gate::new(reserved_26_gate, GateShape::NoError),
    Gate::new(reserved_27_gate, GateShape::NoError),
    Gate::new(hypervisor_injection_gate, GateShape::NoError),
    Gate::new(vmm_communication_gate, GateShape::NoError),
    Gate::new(security_exception_gate, GateShape::NoError),
    Gate::new(reserved_31_gate, GateShape::NoError),
];

/// Look up the entry stub for an architectural exception vector.
///
/// Returns `None` for vectors ≥ 32; gates for device vectors are stamped by
/// the surrounding kernel via [`trap_gate!`](crate::trap_gate).
#[must_use]
pub fn exception_gate(vector: Vector) -> Option<Gate> {
    vector
        .is_exception()
        .then(|| EXCEPTION_GATES[usize::from(vector.get())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_follow_the_error_code_vectors() {
        for v in 0..Vector::EXCEPTION_COUNT {
            #[allow(clippy::cast_possible_truncation)]
            let vector = Vector::new(v as u8);
            let gate = exception_gate(vector).unwrap();
            let expected = if vector.has_error_code() {
                GateShape::WithError
            } else {
                GateShape::NoError
            };
            assert_eq!(gate.shape(), expected, "vector {v}");
        }
    }

    #[test]
    fn no_gates_above_the_exception_range() {
        assert!(exception_gate(Vector::new(32)).is_none());
        assert!(exception_gate(Vector::new(0xE0)).is_none());
    }

    #[test]
    fn entry_symbols_are_distinct() {
        let mut addrs: Vec<u64> = (0..32)
            .map(|v| exception_gate(Vector::new(v)).unwrap().entry_addr())
            .collect();
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), 32);
    }
}
