/*
 * Programmable Interval Timer (8253/8254 PIT) Driver
 *
 * The PIT is the kernel's periodic tick source. Channel 0 is programmed
 * as a square-wave generator whose output is wired to IRQ 0; every edge
 * becomes one scheduling tick. The chip divides a fixed 1.193182 MHz
 * input clock by a 16-bit reload value, so the achievable tick rates are
 * bounded on both sides; the divisor computation checks the requested
 * frequency against those bounds and rounds to the nearest reload value.
 */

use bitflags::bitflags;
use x86_64::instructions::port::Port;

/// PIT input clock in Hz, fixed by the hardware.
const PIT_BASE_FREQUENCY: u32 = 1_193_182;

/// IRQ line the PIT output is wired to.
pub const PIT_IRQ: u8 = 0;

bitflags! {
    /// Mode/command register fields. Channel 0 (bits 6-7) and binary
    /// counting (bit 0) are the all-zero encodings, so only the access
    /// and operating modes appear as named bits.
    struct PitCommand: u8 {
        const ACCESS_LOBYTE = 1 << 4;
        const ACCESS_HIBYTE = 1 << 5;
        const MODE_SQUARE_WAVE = 0b011 << 1;
    }
}

/// The two I/O ports this driver touches: the mode/command register and
/// channel 0's reload register.
struct Pit {
    command: Port<u8>,
    channel0: Port<u8>,
}

impl Pit {
    const fn new() -> Pit {
        Pit {
            command: Port::new(0x43),
            channel0: Port::new(0x40),
        }
    }

    /// Put channel 0 into square-wave mode with the given reload value.
    /// The access mode announces a 16-bit reload, written low byte then
    /// high byte.
    fn start_square_wave(&mut self, divisor: u16) {
        let command =
            PitCommand::ACCESS_LOBYTE | PitCommand::ACCESS_HIBYTE | PitCommand::MODE_SQUARE_WAVE;
        unsafe {
            self.command.write(command.bits());
            self.channel0.write(divisor as u8);
            self.channel0.write((divisor >> 8) as u8);
        }
    }
}

/// Reload value for the requested tick rate, rounded to the nearest
/// achievable divisor. The frequency must divide the input clock into
/// the chip's 16-bit range.
fn divisor_for(frequency_hz: u32) -> u16 {
    assert!(frequency_hz != 0, "tick frequency of zero");
    let divisor = (PIT_BASE_FREQUENCY + frequency_hz / 2) / frequency_hz;
    assert!(
        divisor >= 1 && divisor <= u16::MAX as u32,
        "tick frequency {} Hz outside the PIT's range",
        frequency_hz
    );
    divisor as u16
}

/// Program channel 0 to fire at `frequency_hz`.
///
/// Must run with interrupts disabled; the first tick is delivered as soon
/// as IRQ 0 is unmasked and interrupts are enabled.
pub fn init(frequency_hz: u32) {
    let divisor = divisor_for(frequency_hz);
    Pit::new().start_square_wave(divisor);
    log::info!(
        "PIT configured for {} Hz tick (divisor {})",
        frequency_hz,
        divisor
    );
}
