/*
 * Serial Console Writer
 *
 * This module provides a writer interface for outputting text to the
 * serial console. It implements the core::fmt::Write trait to enable
 * formatted output through the serial port.
 *
 * The writer holds the console lock for its whole lifetime, so one
 * formatted message reaches the wire as a single uninterleaved burst.
 * Because the receive interrupt handler takes the same lock, a Writer
 * must only live inside an interrupts-disabled section - the print
 * macros take care of that, and they are the only intended users.
 */

use core::fmt;

use spin::MutexGuard;

use crate::arch::x86_64::peripheral::uart_16550::SerialPort;
use crate::drivers::serial;

/// A simple writer that writes to the serial port.
pub struct Writer<'a> {
    serial: MutexGuard<'a, SerialPort>,
}

impl<'a> Writer<'a> {
    /// Creates a new instance of the writer, locking the console.
    pub fn new() -> Writer<'a> {
        Writer {
            serial: serial::port(),
        }
    }

    /// Writes a byte to the serial port.
    pub fn write(&mut self, byte: u8) {
        self.serial.write(byte);
    }
}

impl fmt::Write for Writer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write(byte);
        }
        Ok(())
    }
}
