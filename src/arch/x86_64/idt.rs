/*
 * Interrupt Descriptor Table (IDT) Implementation
 *
 * The IDT tells the CPU which code to run for each interrupt vector.
 * Entries 0-31 are CPU exceptions; this kernel treats every exception as
 * a fatal contract violation and panics with the stack frame, because
 * there is no user space to recover into. Entries 32-47 are the sixteen
 * legacy PIC lines; their stubs funnel into the kernel's IRQ dispatch
 * table (`crate::irq`), which owns handler registration, end-of-interrupt
 * signalling, and the deferred-preemption check that runs once interrupt
 * work is finished.
 *
 * The double fault handler runs on its own IST stack (see gdt.rs) so that
 * a kernel stack overflow still produces a readable diagnostic instead of
 * a triple fault.
 */

use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

use crate::irq;

/// First IDT vector used for hardware interrupts (PIC line 0).
pub const IRQ_VECTOR_BASE: u8 = 32;

/// Generate an interrupt stub that forwards one PIC line to irq::dispatch.
macro_rules! irq_stub {
    ($name:ident, $irq:expr) => {
        extern "x86-interrupt" fn $name(_frame: InterruptStackFrame) {
            irq::dispatch($irq);
        }
    };
}

irq_stub!(irq0_stub, 0);
irq_stub!(irq1_stub, 1);
irq_stub!(irq2_stub, 2);
irq_stub!(irq3_stub, 3);
irq_stub!(irq4_stub, 4);
irq_stub!(irq5_stub, 5);
irq_stub!(irq6_stub, 6);
irq_stub!(irq7_stub, 7);
irq_stub!(irq8_stub, 8);
irq_stub!(irq9_stub, 9);
irq_stub!(irq10_stub, 10);
irq_stub!(irq11_stub, 11);
irq_stub!(irq12_stub, 12);
irq_stub!(irq13_stub, 13);
irq_stub!(irq14_stub, 14);
irq_stub!(irq15_stub, 15);

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        // CPU exceptions.
        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.general_protection_fault
            .set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(super::gdt::DOUBLE_FAULT_IST_INDEX);
        }

        // Hardware interrupts (PIC lines 0-15 on vectors 32-47).
        idt[IRQ_VECTOR_BASE].set_handler_fn(irq0_stub);
        idt[IRQ_VECTOR_BASE + 1].set_handler_fn(irq1_stub);
        idt[IRQ_VECTOR_BASE + 2].set_handler_fn(irq2_stub);
        idt[IRQ_VECTOR_BASE + 3].set_handler_fn(irq3_stub);
        idt[IRQ_VECTOR_BASE + 4].set_handler_fn(irq4_stub);
        idt[IRQ_VECTOR_BASE + 5].set_handler_fn(irq5_stub);
        idt[IRQ_VECTOR_BASE + 6].set_handler_fn(irq6_stub);
        idt[IRQ_VECTOR_BASE + 7].set_handler_fn(irq7_stub);
        idt[IRQ_VECTOR_BASE + 8].set_handler_fn(irq8_stub);
        idt[IRQ_VECTOR_BASE + 9].set_handler_fn(irq9_stub);
        idt[IRQ_VECTOR_BASE + 10].set_handler_fn(irq10_stub);
        idt[IRQ_VECTOR_BASE + 11].set_handler_fn(irq11_stub);
        idt[IRQ_VECTOR_BASE + 12].set_handler_fn(irq12_stub);
        idt[IRQ_VECTOR_BASE + 13].set_handler_fn(irq13_stub);
        idt[IRQ_VECTOR_BASE + 14].set_handler_fn(irq14_stub);
        idt[IRQ_VECTOR_BASE + 15].set_handler_fn(irq15_stub);

        idt
    };
}

/// Initialize the Interrupt Descriptor Table
///
/// Must be called early in the boot process, before interrupts are
/// enabled and before any code that can fault.
pub fn init() {
    IDT.load();
    log::info!("IDT initialized");
}

// Exception handlers. Nothing here is recoverable; report and halt.

extern "x86-interrupt" fn divide_error_handler(frame: InterruptStackFrame) {
    panic!("EXCEPTION: divide error\n{:#?}", frame);
}

extern "x86-interrupt" fn invalid_opcode_handler(frame: InterruptStackFrame) {
    panic!("EXCEPTION: invalid opcode\n{:#?}", frame);
}

extern "x86-interrupt" fn breakpoint_handler(frame: InterruptStackFrame) {
    // Breakpoints are harmless; log and continue.
    log::warn!("EXCEPTION: breakpoint\n{:#?}", frame);
}

extern "x86-interrupt" fn general_protection_fault_handler(
    frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "EXCEPTION: general protection fault (error code {:#x})\n{:#?}",
        error_code, frame
    );
}

extern "x86-interrupt" fn page_fault_handler(
    frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;
    panic!(
        "EXCEPTION: page fault at {:?} ({:?})\n{:#?}",
        Cr2::read(),
        error_code,
        frame
    );
}

extern "x86-interrupt" fn double_fault_handler(frame: InterruptStackFrame, _error_code: u64) -> ! {
    panic!("EXCEPTION: double fault\n{:#?}", frame);
}
