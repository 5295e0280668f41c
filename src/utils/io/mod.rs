/*
 * Console I/O Utilities
 *
 * The formatted-output path of the kernel: a `core::fmt::Write` adapter
 * over the serial console plus the print macros built on it.
 */

pub mod macros;
pub mod writer;
