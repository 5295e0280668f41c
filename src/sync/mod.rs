/*
 * Sleeping Synchronization Primitives
 *
 * Blocking primitives built on the scheduler's sleep/wakeup: a mutual
 * exclusion lock with the idiomatic guard API and a condition variable
 * bound to it. Contended callers sleep instead of spinning, so these are
 * for thread context only - interrupt handlers use the scheduler's
 * wakeup directly and share data with threads through interrupts-disabled
 * sections instead.
 */

pub mod condvar;
pub mod mutex;

pub use self::condvar::Condvar;
pub use self::mutex::{Mutex, MutexGuard};
