/*
 * In-Kernel Self-Test Suite
 *
 * This module contains the test threads that validate the kernel core on
 * real hardware (or an emulator): scheduler dispatch and preemption,
 * mutex and condition variable semantics, the timer service, and the
 * heap allocator. The suite runs in a dedicated thread spawned at boot
 * (feature "selftest") and reports through the kernel log, finishing
 * with a pass/fail summary line.
 *
 * ## Suites
 *
 * - `heap_tests`   - alignment, disjointness, coalescing, exhaustion
 * - `thread_tests` - priority dispatch, FIFO order, sleep/wakeup, join
 * - `mutex_tests`  - mutual exclusion, waiter FIFO, try_lock
 * - `condvar_tests`- wait/signal, broadcast, token hand-off
 * - `timer_tests`  - one-shot dispatch, periodic reschedule, ordering
 * - `stress_tests` - one wave of everything at once
 *
 * Tests that need to wait do so by blocking (join, mutex, condvar),
 * never by spinning: the test runner outranks the timer worker, so a
 * busy-wait would starve the very machinery under test.
 */

pub mod condvar_tests;
pub mod heap_tests;
pub mod mutex_tests;
pub mod thread_tests;

use core::sync::atomic::{AtomicUsize, Ordering};

static PASSED: AtomicUsize = AtomicUsize::new(0);
static FAILED: AtomicUsize = AtomicUsize::new(0);

/// Record one test outcome.
pub(crate) fn check(ok: bool, name: &str) {
    if ok {
        PASSED.fetch_add(1, Ordering::SeqCst);
        log::info!("  ok - {}", name);
    } else {
        FAILED.fetch_add(1, Ordering::SeqCst);
        log::error!("  FAIL - {}", name);
    }
}

/// Entry point of the self-test thread.
pub fn run_all(_arg: usize) {
    log::info!("=== kernel self-test suite ===");

    log::info!("--- heap ---");
    heap_tests::run();

    log::info!("--- threads ---");
    thread_tests::run();

    log::info!("--- mutex ---");
    mutex_tests::run();

    log::info!("--- condvar ---");
    condvar_tests::run();

    log::info!("--- timer ---");
    timer_tests::run();

    log::info!("--- stress ---");
    stress_tests::run();

    let passed = PASSED.load(Ordering::SeqCst);
    let failed = FAILED.load(Ordering::SeqCst);
    if failed == 0 {
        log::info!("=== self-test complete: {} passed ===", passed);
    } else {
        log::error!(
            "=== self-test complete: {} passed, {} FAILED ===",
            passed,
            failed
        );
    }
}
