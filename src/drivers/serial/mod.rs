/*
 * Serial Console Driver
 *
 * Buffered, interrupt-driven driver over the COM1 UART. Output is the
 * kernel's console byte sink: synchronous, busy-waiting on the
 * transmitter, safe with interrupts disabled - the logger and the panic
 * path depend on that. Input is interrupt-driven: the receive IRQ
 * handler drains the UART FIFO into a circular buffer and wakes the
 * reader.
 *
 * READER DISCIPLINE:
 * =================
 *
 * The console supports exactly one blocked reader at a time. read_byte()
 * from a second thread while a reader is parked returns Busy instead of
 * queueing - console input has no sensible multi-reader semantics, and
 * refusing loudly beats interleaving bytes between threads.
 *
 * The reader's "buffer empty" test and its sleep are bracketed by an
 * interrupts-disabled section, the same pattern as the timer worker:
 * the producer runs in interrupt context, so masking interrupts is what
 * makes test-then-sleep atomic and wakeups lossless.
 */

use spin::Mutex;

use crate::arch;
use crate::arch::x86_64::peripheral::uart_16550::{COM1_BASE, COM1_IRQ, SerialPort};
use crate::config::SERIAL_RX_BUF_SIZE;
use crate::error::KernelError;
use crate::irq;
use crate::scheduler::{self, ThreadId};
use crate::utils::cbuf::CircularBuffer;

/// The console UART. Locked only inside interrupts-disabled sections, so
/// the receive IRQ handler can never deadlock against a writer.
static UART: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1_BASE));

/// Receive side: buffered bytes plus the parked reader, if any.
struct RxState {
    buf: CircularBuffer<SERIAL_RX_BUF_SIZE>,
    reader: Option<ThreadId>,
}

static RX: Mutex<RxState> = Mutex::new(RxState {
    buf: CircularBuffer::new(),
    reader: None,
});

/// Initialize the UART hardware. Runs first thing at boot so the logger
/// has somewhere to write; input stays dead until `enable_input`.
pub fn init() {
    arch::without_interrupts(|| UART.lock().init());
}

/// Hook up the receive interrupt. Requires the interrupt controller and
/// IRQ layer to be up.
pub fn enable_input() {
    irq::register(COM1_IRQ, rx_irq_handler, 0).expect("serial IRQ registration failed");
    log::info!("serial input on COM1 (IRQ {})", COM1_IRQ);
}

/// Receive interrupt: drain the FIFO into the buffer, oldest bytes give
/// way when it overflows, and wake the parked reader.
fn rx_irq_handler(_arg: usize) {
    let reader = {
        let mut uart = UART.lock();
        let mut rx = RX.lock();
        while let Some(byte) = uart.try_receive() {
            let _ = rx.buf.push(byte, true);
        }
        rx.reader
    };
    if let Some(reader) = reader {
        scheduler::wake_thread(reader);
    }
}

/// Read one byte, blocking until input arrives.
///
/// Returns Busy when another thread is already parked waiting for input.
pub fn read_byte() -> Result<u8, KernelError> {
    let cur = scheduler::current_thread_id();

    scheduler::preempt_disable();
    let saved = arch::intr_save();

    let result = loop {
        let mut rx = RX.lock();
        if let Some(byte) = rx.buf.pop() {
            break Ok(byte);
        }
        match rx.reader {
            Some(reader) if reader != cur => break Err(KernelError::Busy),
            _ => rx.reader = Some(cur),
        }
        drop(rx);
        scheduler::sleep_current();
    };

    {
        let mut rx = RX.lock();
        if rx.reader == Some(cur) {
            rx.reader = None;
        }
    }

    arch::intr_restore(saved);
    scheduler::preempt_enable();
    result
}

/// Lock the console UART for a burst of output.
///
/// The receive IRQ handler takes the same lock, so holders must have
/// interrupts disabled (the print macros guarantee this).
pub(crate) fn port() -> spin::MutexGuard<'static, SerialPort> {
    UART.lock()
}

/// Write one byte to the console. Safe with interrupts disabled.
pub fn write_byte(byte: u8) {
    arch::without_interrupts(|| UART.lock().write(byte));
}

/// Write a string to the console as one uninterrupted burst.
pub fn write_str(s: &str) {
    arch::without_interrupts(|| {
        let mut uart = UART.lock();
        for byte in s.bytes() {
            uart.write(byte);
        }
    });
}

/// Tear the UART lock open after a panic so the diagnostic path can
/// print even if the panicking thread held the console.
///
/// # Safety
/// Only from the panic handler, with interrupts disabled and no return
/// to normal execution.
pub unsafe fn force_unlock() {
    unsafe { UART.force_unlock() };
}
