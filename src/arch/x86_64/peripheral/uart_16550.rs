/*
 * 16550 UART Driver
 *
 * Register-level driver for the PC serial port. This is the kernel's
 * console byte sink: the logger, the print macros, and the panic path all
 * end up in `write`, and the serial driver's receive buffer is fed from
 * `try_receive` in the IRQ handler.
 *
 * `send` busy-waits on the transmit-holding-register-empty bit, so it is
 * safe to call with interrupts disabled - which the diagnostic paths
 * require.
 */

use bitflags::bitflags;
use x86_64::instructions::port::Port;

/// I/O port base of COM1.
pub const COM1_BASE: u16 = 0x3F8;

/// IRQ line of COM1.
pub const COM1_IRQ: u8 = 4;

bitflags! {
    /// Interrupt enable register flags.
    struct IntEnFlags: u8 {
        const RECEIVED = 1;
        const SENT = 1 << 1;
        const ERRORED = 1 << 2;
        const STATUS_CHANGE = 1 << 3;
        // 4 to 7 are unused
    }
}

bitflags! {
    /// Line status register flags.
    struct LineStsFlags: u8 {
        const INPUT_FULL = 1;
        // 1 to 4 unknown
        const OUTPUT_EMPTY = 1 << 5;
        // 6 and 7 unknown
    }
}

/// Serial port representation.
pub struct SerialPort {
    data: Port<u8>,       // Data register, read to receive, write to send
    int_en: Port<u8>,     // Interrupt enable
    fifo_ctrl: Port<u8>,  // FIFO control
    line_ctrl: Port<u8>,  // Line control
    modem_ctrl: Port<u8>, // Modem control
    line_sts: Port<u8>,   // Line status
}

impl SerialPort {
    /// Create a new serial port instance for the given port base.
    pub const fn new(base: u16) -> SerialPort {
        SerialPort {
            data: Port::new(base),
            int_en: Port::new(base + 1),
            fifo_ctrl: Port::new(base + 2),
            line_ctrl: Port::new(base + 3),
            modem_ctrl: Port::new(base + 4),
            line_sts: Port::new(base + 5),
        }
    }

    /// Initialize the port: 38400 baud, 8N1, FIFOs on, receive interrupt
    /// enabled.
    pub fn init(&mut self) {
        unsafe {
            self.int_en.write(0x00);
            self.line_ctrl.write(0x80); // DLAB on
            self.data.write(0x03); // divisor low: 38400 baud
            self.int_en.write(0x00); // divisor high
            self.line_ctrl.write(0x03); // 8 bits, no parity, one stop
            self.fifo_ctrl.write(0xC7);
            self.modem_ctrl.write(0x0B);
            self.int_en.write(IntEnFlags::RECEIVED.bits());
        }
    }

    fn line_sts(&mut self) -> LineStsFlags {
        LineStsFlags::from_bits_truncate(unsafe { self.line_sts.read() })
    }

    /// Read one byte if the receiver holds one.
    pub fn try_receive(&mut self) -> Option<u8> {
        if self.line_sts().contains(LineStsFlags::INPUT_FULL) {
            Some(unsafe { self.data.read() })
        } else {
            None
        }
    }

    /// Send a raw byte, busy-waiting for transmitter space.
    pub fn send(&mut self, data: u8) {
        while !self.line_sts().contains(LineStsFlags::OUTPUT_EMPTY) {}
        unsafe { self.data.write(data) }
    }

    /// Write a byte with console conventions: newline becomes CRLF and
    /// backspace/delete rubs out the previous character.
    pub fn write(&mut self, b: u8) {
        match b {
            8 | 0x7F => {
                self.send(8);
                self.send(b' ');
                self.send(8);
            }
            b'\n' => {
                self.send(b'\r');
                self.send(b'\n');
            }
            _ => {
                self.send(b);
            }
        }
    }
}
