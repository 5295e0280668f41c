/*
 * x86_64 Architecture Support
 *
 * This module implements the architecture contract for x86_64: interrupt
 * masking, the idle instruction, and processor bring-up (GDT, IDT,
 * peripheral controllers). It serves as a high-level interface to the
 * low-level instructions the kernel core builds its critical sections on.
 *
 * Why this is important:
 * - Provides safe abstractions for interrupt control
 * - Essential for creating atomic sections in kernel code
 * - Forms the basis for all kernel synchronization primitives
 * - Keeps every privileged instruction in one auditable place
 *
 * All of these functions act as compiler memory barriers: the inline
 * assembly behind them is declared with memory clobbers, so the compiler
 * will not move loads or stores across a critical-section boundary.
 */

pub mod context;
pub mod gdt;
pub mod idt;
pub mod peripheral;

use x86_64::instructions::interrupts;

/// Opaque saved interrupt state, returned by `intr_save`.
///
/// On x86_64 this is simply whether IF was set. Holders pass it back to
/// `intr_restore`; an inner save/restore pair nested inside an outer one
/// leaves interrupts disabled until the outer restore runs.
#[derive(Debug, Clone, Copy)]
pub struct IntrState {
    was_enabled: bool,
}

/// Enable interrupts globally.
///
/// Should only be called after the IDT has been properly initialized.
pub fn intr_enable() {
    interrupts::enable();
}

/// Disable interrupts globally.
pub fn intr_disable() {
    interrupts::disable();
}

/// Check whether interrupts are currently enabled.
pub fn intr_enabled() -> bool {
    interrupts::are_enabled()
}

/// Disable interrupts and return the previous state.
pub fn intr_save() -> IntrState {
    let was_enabled = interrupts::are_enabled();
    if was_enabled {
        interrupts::disable();
    }
    IntrState { was_enabled }
}

/// Restore the interrupt state captured by a matching `intr_save`.
pub fn intr_restore(state: IntrState) {
    if state.was_enabled {
        interrupts::enable();
    }
}

/// Execute a closure with interrupts disabled, restoring the previous
/// state afterwards.
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    interrupts::without_interrupts(f)
}

/// Halt the processor until the next interrupt.
///
/// Interrupts are enabled and the halt executed back to back, so a wakeup
/// interrupt cannot slip into the gap between the two and leave the
/// processor halted with work pending.
pub fn idle() {
    interrupts::enable_and_hlt();
}

/// Initialize processor tables. Must run before interrupts are enabled.
pub fn init() {
    gdt::init();
    idt::init();
}
