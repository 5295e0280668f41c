/*
 * Programmable Interrupt Controller (8259 PIC) Driver
 *
 * The two chained 8259 PICs route the sixteen legacy IRQ lines to CPU
 * vectors. This module remaps them above the CPU exception range and
 * exposes the interrupt-controller contract the kernel's IRQ layer
 * consumes: enable/disable a line by IRQ number and acknowledge a
 * serviced interrupt.
 *
 * All lines start masked; a line is only unmasked when a handler is
 * registered for it, so a spurious device interrupt can never reach an
 * empty dispatch slot.
 */

use pic8259::ChainedPics;
use spin::Mutex;

/// Vector base for the primary PIC. Lines 0-7 map to vectors 32-39,
/// lines 8-15 to vectors 40-47.
pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

/// Number of IRQ lines behind the chained controllers.
pub const NR_IRQ_LINES: u8 = 16;

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Remap the controllers and mask every line.
///
/// Must run with interrupts disabled, before the IDT is live for
/// hardware vectors.
pub fn init() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        // Mask everything except the cascade line (IRQ2), which must stay
        // open for the secondary controller to deliver at all.
        pics.write_masks(!(1 << 2), 0xFF);
    }
    log::info!("PIC remapped to vectors {}..{}", PIC_1_OFFSET, PIC_1_OFFSET + NR_IRQ_LINES);
}

/// Unmask one IRQ line.
///
/// Called with interrupts disabled (the IRQ registration path).
pub fn enable(irq: u8) {
    assert!(irq < NR_IRQ_LINES, "IRQ line {} out of range", irq);
    let mut pics = PICS.lock();
    let masks = unsafe { pics.read_masks() };
    let (mut master, mut slave) = (masks[0], masks[1]);
    if irq < 8 {
        master &= !(1 << irq);
    } else {
        slave &= !(1 << (irq - 8));
    }
    unsafe { pics.write_masks(master, slave) };
}

/// Mask one IRQ line.
///
/// Called with interrupts disabled.
pub fn disable(irq: u8) {
    assert!(irq < NR_IRQ_LINES, "IRQ line {} out of range", irq);
    let mut pics = PICS.lock();
    let masks = unsafe { pics.read_masks() };
    let (mut master, mut slave) = (masks[0], masks[1]);
    if irq < 8 {
        master |= 1 << irq;
    } else {
        slave |= 1 << (irq - 8);
    }
    unsafe { pics.write_masks(master, slave) };
}

/// Acknowledge a serviced interrupt so the controller can deliver the
/// next one. Interrupt context only.
pub fn end_of_interrupt(irq: u8) {
    assert!(irq < NR_IRQ_LINES, "IRQ line {} out of range", irq);
    unsafe {
        PICS.lock().notify_end_of_interrupt(PIC_1_OFFSET + irq);
    }
}
