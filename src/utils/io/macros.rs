/*
 * Kernel Print Macros
 *
 * Kernel-specific versions of the familiar print!/println! macros,
 * adapted for the bare-metal environment: output goes to the serial
 * console, and the whole formatted message is emitted inside one
 * interrupts-disabled section so that interrupt-context logging can
 * never interleave with (or deadlock against) thread-context printing.
 */

/// Prints formatted text to the serial console.
///
/// Same syntax as the standard `print!`. The console lock is held and
/// interrupts are masked for the duration of one formatted message.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        $crate::arch::without_interrupts(|| {
            let _ = $crate::utils::io::writer::Writer::new()
                .write_fmt(format_args!($($arg)*));
        });
    });
}

/// Prints a formatted string followed by a newline to the serial
/// console.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::print!("\n"));
    ($fmt:expr) => ($crate::print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::print!(concat!($fmt, "\n"), $($arg)*));
}
