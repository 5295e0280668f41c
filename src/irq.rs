/*
 * IRQ Registration and Dispatch
 *
 * The kernel-level interrupt layer: a table mapping IRQ lines to handler
 * functions, filled by drivers at setup time and consulted by the IDT
 * stubs on every hardware interrupt.
 *
 * Registration unmasks the line at the controller, so a line only
 * delivers once somebody is there to service it; an interrupt arriving on
 * an unregistered line can therefore only mean corrupted state and is
 * fatal.
 *
 * Dispatch runs in interrupt context with interrupts disabled. Its tail
 * is where deferred preemption happens: after the handler has run and
 * the controller has been acknowledged, the scheduler gets one chance to
 * act on a switch request the handler (or the tick) recorded. Handlers
 * themselves must not block; waking threads is their only scheduling
 * tool.
 */

use spin::Mutex;

use crate::arch;
use crate::arch::x86_64::peripheral::pic;
use crate::error::KernelError;
use crate::scheduler;

/// Number of registrable IRQ lines.
pub const NR_IRQS: usize = pic::NR_IRQ_LINES as usize;

/// A registered handler: function plus its argument.
#[derive(Clone, Copy)]
struct IrqEntry {
    handler: fn(usize),
    arg: usize,
}

/// Handler table, indexed by IRQ line.
static HANDLERS: Mutex<[Option<IrqEntry>; NR_IRQS]> = Mutex::new([None; NR_IRQS]);

/// Register `handler` for `irq` and unmask the line.
///
/// Fails with InvalidArgument for a line beyond the controller. Only one
/// handler per line; registering twice is a fatal error. The table and
/// the controller mask are updated with both preemption and interrupts
/// disabled, since the table is shared with interrupt context.
pub fn register(irq: u8, handler: fn(usize), arg: usize) -> Result<(), KernelError> {
    if irq as usize >= NR_IRQS {
        return Err(KernelError::InvalidArgument);
    }

    scheduler::preempt_disable();
    arch::without_interrupts(|| {
        let mut handlers = HANDLERS.lock();
        assert!(
            handlers[irq as usize].is_none(),
            "IRQ {} registered twice",
            irq
        );
        handlers[irq as usize] = Some(IrqEntry { handler, arg });
        pic::enable(irq);
    });
    scheduler::preempt_enable();

    log::debug!("IRQ {} registered", irq);
    Ok(())
}

/// Service one hardware interrupt. Called from the IDT stubs in
/// interrupt context with interrupts disabled.
pub fn dispatch(irq: u8) {
    let entry = {
        let handlers = HANDLERS.lock();
        handlers[irq as usize]
    };

    match entry {
        Some(entry) => (entry.handler)(entry.arg),
        None => panic!("interrupt on unregistered IRQ {}", irq),
    }

    // Acknowledge before any context switch: a preempted thread may stay
    // suspended for a long time, and the controller must not sit blocked
    // on an unacknowledged interrupt meanwhile.
    pic::end_of_interrupt(irq);

    scheduler::reschedule_from_interrupt();
}
