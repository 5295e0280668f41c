/*
 * Architecture Abstraction Layer
 *
 * This module re-exports the architecture-specific functionality that the
 * rest of the kernel depends on. The kernel core only ever uses the narrow
 * contract surfaced here:
 *
 * - Interrupt control: intr_enable/intr_disable/intr_enabled and the
 *   nesting pair intr_save/intr_restore, all with compiler-barrier
 *   semantics.
 * - idle(): halt the processor until the next interrupt.
 * - Context management: stack_forge to prepare a brand-new thread stack,
 *   context_switch to move between two threads, context_load to abandon
 *   the boot context for the first real thread.
 *
 * Everything else under arch/ (descriptor tables, the interrupt
 * controller, the timer chip, the UART) is bring-up detail that the core
 * reaches only through the irq and driver layers.
 */

pub mod x86_64;

pub use self::x86_64::context::{context_load, context_switch, stack_forge};
pub use self::x86_64::{
    IntrState, idle, intr_disable, intr_enable, intr_enabled, intr_restore, intr_save,
    without_interrupts,
};
