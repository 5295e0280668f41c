/*
 * x86_64 Peripheral Controllers
 *
 * The three pieces of board-level hardware the kernel touches directly:
 * the 8259 interrupt controller pair (mask/unmask/acknowledge by IRQ
 * line), the 8253/8254 programmable interval timer (the periodic tick
 * source), and the 16550 UART (the console byte sink).
 */

pub mod pic;
pub mod pit;
pub mod uart_16550;
