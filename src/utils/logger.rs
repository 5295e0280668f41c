/*
 * Kernel Logging System
 *
 * Backend for the `log` crate facade used throughout the kernel. Records
 * are formatted and written to the serial console; the level filter is
 * fixed at Info so debug/trace chatter stays out of the boot log unless
 * the filter below is changed.
 *
 * The logger is safe to use from interrupt context: the print path masks
 * interrupts around the console lock.
 */

use log::{Level, LevelFilter, Metadata, Record};

use crate::serial_println;

/// Logger instance writing to the serial console.
struct CruxLogger;

impl log::Log for CruxLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            serial_println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CruxLogger = CruxLogger;

/// Install the logger. Must run before the first log statement; panics
/// if a logger is already installed.
pub fn init() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .expect("logger already installed");
    serial_println!("logger initialized");
}
