/*
 * Kernel Error Types
 *
 * This module defines the recoverable error kinds shared by all kernel
 * subsystems. The split is deliberate and mirrors the rest of the kernel's
 * failure policy:
 *
 * - Recoverable conditions (resource exhaustion, busy resources, bad
 *   arguments) are returned to the caller as `Result<_, KernelError>` and
 *   propagated with `?`.
 * - Contract violations (unlock by non-owner, waking a dead thread,
 *   preemption-level underflow, heap tag corruption, unregistered IRQ
 *   vectors) are bugs, not conditions; they panic and halt the machine
 *   after a diagnostic line.
 *
 * There is no translation between categories: a function either returns a
 * `KernelError` or it panics, never both for the same condition.
 */

use core::fmt;

/// Recoverable kernel error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A resource pool is exhausted: the heap has no block large enough,
    /// or the thread table is full. Creation paths that return this have
    /// released everything they acquired (creation is atomic).
    OutOfMemory,

    /// A non-blocking acquisition found the resource held: `try_lock` on a
    /// locked mutex, or a second concurrent reader on a single-reader
    /// device.
    Busy,

    /// An argument is out of range: an IRQ number beyond the controller's
    /// lines, a priority beyond the configured levels, a heap region whose
    /// size or alignment is unusable.
    InvalidArgument,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::OutOfMemory => "out of memory",
            KernelError::Busy => "resource busy",
            KernelError::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}
